//! Artifact persistence

use crate::fetch::is_safe_job_id;
use crate::output::JobOutput;
use crate::SinkError;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives the output of every finished job, exactly once per run
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Persist a job's output and the posting it was extracted from
    async fn persist(&self, output: &JobOutput, posting_text: &str) -> Result<(), SinkError>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl ArtifactSink for NullSink {
    async fn persist(&self, _output: &JobOutput, _posting_text: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes one directory per job under a root directory
///
/// Layout of `<root>/<job_id>/`:
///
/// | File | Contents |
/// |---|---|
/// | `posting.txt` | fetched posting text |
/// | `structured.json` | validated record, or `null` |
/// | `qc.json` | final verdict, or `null` |
/// | `report.md` | report (only present when one exists) |
/// | `trace.json` | trace events |
/// | `output.json` | the complete output envelope |
///
/// A later run of the same job overwrites the files and removes a
/// `report.md` left by an earlier run that had a report.
#[derive(Debug, Clone)]
pub struct DirArtifactSink {
    root: PathBuf,
}

impl DirArtifactSink {
    /// Create a sink writing under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds a job's artifacts
    pub fn job_dir(&self, output: &JobOutput) -> Result<PathBuf, SinkError> {
        if !is_safe_job_id(&output.job_id) {
            return Err(SinkError::InvalidJobId(output.job_id.to_string()));
        }
        Ok(self.root.join(output.job_id.as_str()))
    }
}

async fn write_json<T: Serialize + ?Sized>(path: PathBuf, value: &T) -> Result<(), SinkError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[async_trait]
impl ArtifactSink for DirArtifactSink {
    async fn persist(&self, output: &JobOutput, posting_text: &str) -> Result<(), SinkError> {
        let dir = self.job_dir(output)?;
        tokio::fs::create_dir_all(&dir).await?;

        tokio::fs::write(dir.join("posting.txt"), posting_text).await?;
        write_json(dir.join("structured.json"), &output.record).await?;
        write_json(dir.join("qc.json"), &output.verdict).await?;
        let report_path = dir.join("report.md");
        match &output.report {
            Some(report) => tokio::fs::write(&report_path, report).await?,
            None => match tokio::fs::remove_file(&report_path).await {
                Ok(()) => debug!(job_id = %output.job_id, "Removed report from earlier run"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        write_json(dir.join("trace.json"), &output.trace).await?;
        write_json(dir.join("output.json"), output).await?;

        debug!(job_id = %output.job_id, dir = %dir.display(), "Persisted artifacts");
        Ok(())
    }
}
