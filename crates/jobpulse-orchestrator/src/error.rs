//! Error types for the Orchestrator and its collaborators

use jobpulse_domain::{JobId, TraceEvent};
use jobpulse_llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run
///
/// Only a failed fetch stops a job early. Extraction, QC and report
/// failures are recorded in the trace and the job still finalizes.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The posting text could not be obtained
    #[error("Fetch failed for job {job_id}: {source}")]
    Fetch {
        /// Job that failed
        job_id: JobId,
        /// Underlying fetch error
        #[source]
        source: FetchError,
        /// Trace of the run up to and including the failed fetch
        trace: Vec<TraceEvent>,
    },

    /// Configuration is invalid or could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A backend client could not be constructed
    #[error("Backend setup failed: {0}")]
    Backend(#[from] LlmError),

    /// A batch task ended without producing a result
    #[error("Job {job_id} did not complete: {message}")]
    Task {
        /// Job whose task was lost
        job_id: JobId,
        /// Panic or abort message from the runtime
        message: String,
    },
}

impl PipelineError {
    /// Stable identifier for logs and batch summaries
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "fetch_failure",
            PipelineError::Config(_) => "config_error",
            PipelineError::Backend(_) => "backend_setup",
            PipelineError::Task { .. } => "task_failure",
        }
    }
}

/// Errors from source text acquisition
#[derive(Error, Debug)]
pub enum FetchError {
    /// No posting exists for the job
    #[error("No posting found at {0}")]
    NotFound(PathBuf),

    /// The posting exists but holds no text
    #[error("Posting for job {0} is empty")]
    Empty(JobId),

    /// The job id cannot be used as a file name
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    /// Reading the posting failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other source failure
    #[error("Fetch error: {0}")]
    Other(String),
}

/// Errors from report generation
#[derive(Error, Debug)]
pub enum ReportError {
    /// The report backend failed
    #[error("Report backend failed: {0}")]
    Backend(#[from] LlmError),

    /// Record or verdict could not be rendered into the prompt
    #[error("Failed to serialize report input: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The job was cancelled while the report was generating
    #[error("Report cancelled")]
    Cancelled,
}

/// Errors from artifact persistence
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing an artifact failed
    #[error("Failed to write artifact: {0}")]
    Io(#[from] std::io::Error),

    /// An artifact could not be serialized
    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The job id cannot be used as a directory name
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),
}

/// Errors loading pipeline configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("Failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Extractor section is invalid
    #[error("Invalid extractor section: {0}")]
    Extractor(#[from] jobpulse_extractor::ConfigError),

    /// QC section is invalid
    #[error("Invalid qc section: {0}")]
    Rules(#[from] jobpulse_gatekeeper::GatekeeperError),

    /// Any other out-of-range value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
