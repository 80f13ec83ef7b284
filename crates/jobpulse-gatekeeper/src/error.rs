//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur loading or checking QC rules
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Rules file could not be parsed
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Rules could not be serialized
    #[error("Failed to serialize to TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
