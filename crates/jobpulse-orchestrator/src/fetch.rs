//! Source text acquisition

use crate::FetchError;
use async_trait::async_trait;
use jobpulse_domain::JobId;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default directory of posting text files
pub const DEFAULT_POSTINGS_DIR: &str = "data/raw/jd_txt";

/// Posting text plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPosting {
    /// Raw posting text
    pub text: String,

    /// Free-form origin metadata (path, length, digest, source)
    pub origin: Map<String, Value>,
}

/// Supplies posting text for a job
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the posting for `job_id`
    ///
    /// Must fail rather than return empty text.
    async fn fetch(
        &self,
        job_id: &JobId,
        source_hint: Option<&str>,
    ) -> Result<FetchedPosting, FetchError>;
}

/// Reads postings from `<root>/<job_id>.txt`
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    /// Create a fetcher over a directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being read
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a job's posting is read from
    pub fn path_for(&self, job_id: &JobId) -> Result<PathBuf, FetchError> {
        if !is_safe_job_id(job_id) {
            return Err(FetchError::InvalidJobId(job_id.to_string()));
        }
        Ok(self.root.join(format!("{}.txt", job_id)))
    }
}

impl Default for DirFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_POSTINGS_DIR)
    }
}

#[async_trait]
impl Fetcher for DirFetcher {
    async fn fetch(
        &self,
        job_id: &JobId,
        source_hint: Option<&str>,
    ) -> Result<FetchedPosting, FetchError> {
        let path = self.path_for(job_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            return Err(FetchError::Empty(job_id.clone()));
        }

        let digest = format!("{:x}", Sha256::digest(&bytes));
        debug!(job_id = %job_id, path = %path.display(), chars = text.len(), "Read posting");

        let mut origin = Map::new();
        origin.insert("source".to_string(), json!(source_hint));
        origin.insert("path".to_string(), json!(path.display().to_string()));
        origin.insert("chars".to_string(), json!(text.chars().count()));
        origin.insert("sha256".to_string(), json!(digest));

        Ok(FetchedPosting { text, origin })
    }
}

/// Whether a job id can be used as a single path component
pub(crate) fn is_safe_job_id(job_id: &JobId) -> bool {
    let id = job_id.as_str();
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &[u8]) {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn test_reads_posting_and_records_origin() {
        let dir = TempDir::new().unwrap();
        write(&dir, "123.txt", b"Data Engineer\nAcme");
        let fetcher = DirFetcher::new(dir.path());

        let posting = fetcher
            .fetch(&JobId::new("123"), Some("handshake"))
            .await
            .unwrap();

        assert_eq!(posting.text, "Data Engineer\nAcme");
        assert_eq!(posting.origin["source"], "handshake");
        assert_eq!(posting.origin["chars"], 18);
        // sha256("Data Engineer\nAcme") is 64 hex characters
        assert_eq!(posting.origin["sha256"].as_str().unwrap().len(), 64);
        assert!(posting.origin["path"].as_str().unwrap().ends_with("123.txt"));
    }

    #[tokio::test]
    async fn test_digest_is_stable() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"same text");
        write(&dir, "b.txt", b"same text");
        let fetcher = DirFetcher::new(dir.path());

        let a = fetcher.fetch(&JobId::new("a"), None).await.unwrap();
        let b = fetcher.fetch(&JobId::new("b"), None).await.unwrap();
        assert_eq!(a.origin["sha256"], b.origin["sha256"]);
        assert_eq!(a.origin["source"], Value::Null);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fetcher = DirFetcher::new(dir.path());
        let result = fetcher.fetch(&JobId::new("nope"), None).await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_file_is_empty_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "blank.txt", b"  \n\t\n");
        let fetcher = DirFetcher::new(dir.path());
        let result = fetcher.fetch(&JobId::new("blank"), None).await;
        assert!(matches!(result, Err(FetchError::Empty(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        write(&dir, "bytes.txt", b"Caf\xff engineer");
        let fetcher = DirFetcher::new(dir.path());
        let posting = fetcher.fetch(&JobId::new("bytes"), None).await.unwrap();
        assert!(posting.text.starts_with("Caf"));
        assert!(posting.text.ends_with("engineer"));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let fetcher = DirFetcher::default();
        assert!(matches!(
            fetcher.path_for(&JobId::new("../secret")),
            Err(FetchError::InvalidJobId(_))
        ));
        assert!(fetcher.path_for(&JobId::new("..")).is_err());
        assert!(fetcher.path_for(&JobId::new("")).is_err());
        assert!(fetcher.path_for(&JobId::new("10293847")).is_ok());
    }
}
