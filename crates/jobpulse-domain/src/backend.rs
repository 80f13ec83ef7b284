//! Identity of the generation backend that produced an artifact

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the fallback pair a backend belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Locally hosted model
    Local,

    /// Remote completion API; the fallback of last resort
    Api,
}

impl BackendKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Api => "api",
        }
    }

    /// Parse a kind from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(BackendKind::Local),
            "api" => Some(BackendKind::Api),
            _ => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid backend kind: {}", s))
    }
}

/// Describes a configured backend for traces and verdicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendInfo {
    /// Local or remote
    pub kind: BackendKind,

    /// Provider name (e.g. "ollama", "openai", "nvidia", "mock")
    pub provider: String,

    /// Model identifier passed to the provider
    pub model: String,
}

impl BackendInfo {
    /// Create a new backend description
    pub fn new(kind: BackendKind, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Whether this is the remote API backend
    pub fn is_api(&self) -> bool {
        self.kind == BackendKind::Api
    }
}

impl fmt::Display for BackendInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.provider, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("local".parse::<BackendKind>(), Ok(BackendKind::Local));
        assert_eq!("API".parse::<BackendKind>(), Ok(BackendKind::Api));
        assert!("remote".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_info_display() {
        let info = BackendInfo::new(BackendKind::Api, "openai", "gpt-4o-mini");
        assert_eq!(info.to_string(), "api:openai/gpt-4o-mini");
        assert!(info.is_api());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&BackendKind::Local).unwrap();
        assert_eq!(json, "\"local\"");
    }
}
