//! Configuration for the Extractor

use crate::error::ConfigError;
use crate::prompt::PromptVersion;
use crate::salvage::DEFAULT_MAX_APPEND;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum cleaned posting length (characters)
    pub max_text_length: usize,

    /// Maximum time for a single backend call (seconds)
    pub backend_timeout_secs: u64,

    /// Maximum closing characters the salvage parser may append
    pub max_append: usize,

    /// Built-in prompt template used by `extract_posting`
    pub prompt_version: PromptVersion,

    /// Whether `extract_posting` strips boilerplate before prompting
    pub clean_input: bool,
}

impl ExtractorConfig {
    /// Get the backend timeout as a Duration
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_text_length == 0 {
            return Err(ConfigError::Invalid(
                "max_text_length must be greater than 0".to_string(),
            ));
        }
        if self.backend_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "backend_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 50_000,
            backend_timeout_secs: 120,
            max_append: DEFAULT_MAX_APPEND,
            prompt_version: PromptVersion::V2,
            clean_input: true,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: short timeout and input cap for fast local models
    pub fn aggressive() -> Self {
        Self {
            max_text_length: 20_000,
            backend_timeout_secs: 30,
            max_append: DEFAULT_MAX_APPEND,
            prompt_version: PromptVersion::V2,
            clean_input: true,
        }
    }

    /// Lenient preset: long timeout for slow remote APIs and large postings
    pub fn lenient() -> Self {
        Self {
            max_text_length: 100_000,
            backend_timeout_secs: 600,
            max_append: DEFAULT_MAX_APPEND * 4,
            prompt_version: PromptVersion::V2,
            clean_input: true,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_append, 256);
        assert_eq!(config.backend_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::aggressive().validate().is_ok());
        assert!(ExtractorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_max_text_length() {
        let config = ExtractorConfig {
            max_text_length: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_timeout() {
        let config = ExtractorConfig {
            backend_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("prompt_version = \"jd_extract_v2\""));
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ExtractorConfig::from_toml(
            r#"
            backend_timeout_secs = 15
            prompt_version = "jd_extract_v1"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend_timeout_secs, 15);
        assert_eq!(config.prompt_version, PromptVersion::V1);
        assert_eq!(config.max_text_length, 50_000);
    }

    #[test]
    fn test_unknown_prompt_version_rejected() {
        let result = ExtractorConfig::from_toml(r#"prompt_version = "jd_extract_v7""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
