//! Error types for the Extractor

use crate::salvage::SalvageFailure;
use thiserror::Error;

/// Why a backend call produced no text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The backend returned an error
    #[error("{0}")]
    Error(String),

    /// The call exceeded the configured timeout
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// The caller cancelled the job
    #[error("cancelled")]
    Cancelled,
}

/// Errors that can occur during one extraction attempt
///
/// None of these abort a job; the orchestrator turns them into an absent
/// record and a failed QC verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The backend failed, timed out, or was cancelled
    #[error("Backend failure: {0}")]
    Backend(BackendFailure),

    /// No JSON object could be salvaged from the completion
    #[error("Parse failure: {reason}")]
    Parse {
        /// Salvage sub-reason
        reason: SalvageFailure,
        /// Text used on the final parse attempt
        attempted: String,
    },

    /// Required keys are absent from the salvaged object
    #[error("Missing required keys: {0:?}")]
    MissingFields(Vec<String>),

    /// List-typed keys hold non-list values (key, JSON type)
    #[error("List-typed keys have wrong types: {0:?}")]
    BadListType(Vec<(String, String)>),

    /// Cleaned posting exceeds the configured maximum
    #[error("Text too long: {0} chars (max: {1})")]
    InputTooLong(usize, usize),
}

impl ExtractionError {
    /// Stable identifier for traces and attempt summaries
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Backend(_) => "backend_failure",
            ExtractionError::Parse { .. } => "parse_failure",
            ExtractionError::MissingFields(_) => "schema_missing_fields",
            ExtractionError::BadListType(_) => "schema_bad_list_type",
            ExtractionError::InputTooLong(..) => "input_too_long",
        }
    }

    /// Finer-grained reason where one exists (e.g. `timeout`, `no_object_found`)
    pub fn sub_reason(&self) -> Option<&'static str> {
        match self {
            ExtractionError::Backend(BackendFailure::Error(_)) => Some("error"),
            ExtractionError::Backend(BackendFailure::Timeout(_)) => Some("timeout"),
            ExtractionError::Backend(BackendFailure::Cancelled) => Some("cancelled"),
            ExtractionError::Parse { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// Errors in prompt template handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// Template does not contain the posting placeholder
    #[error("Prompt template '{0}' is missing the {{{{JOB_DESCRIPTION}}}} placeholder")]
    MissingPlaceholder(String),

    /// No built-in template has this name
    #[error("Unknown prompt version: {0}")]
    UnknownVersion(String),
}

/// Errors loading or validating extractor configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
