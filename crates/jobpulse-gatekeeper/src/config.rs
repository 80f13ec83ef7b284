//! Gatekeeper configuration

use crate::GatekeeperError;
use jobpulse_domain::JOB_POSTING_FIELDS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarative QC rule set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcRules {
    /// Fields that must be present and non-empty
    pub require_keys: Vec<String>,

    /// Groups of fields; each group needs at least one non-empty member
    pub require_non_empty_any_of: Vec<Vec<String>>,
}

impl Default for QcRules {
    fn default() -> Self {
        Self::job_posting()
    }
}

impl QcRules {
    /// Create a rule set
    pub fn new<S: Into<String>>(
        require_keys: impl IntoIterator<Item = S>,
        require_non_empty_any_of: Vec<Vec<String>>,
    ) -> Self {
        Self {
            require_keys: require_keys.into_iter().map(Into::into).collect(),
            require_non_empty_any_of,
        }
    }

    /// Default rules for job postings: title, company and at least one of
    /// requirements/responsibilities
    pub fn job_posting() -> Self {
        Self::new(
            ["role_title", "company", "requirements", "responsibilities"],
            vec![vec!["requirements".to_string(), "responsibilities".to_string()]],
        )
    }

    /// Create a permissive rule set (nothing required, every record passes)
    pub fn permissive() -> Self {
        Self {
            require_keys: Vec::new(),
            require_non_empty_any_of: Vec::new(),
        }
    }

    /// Create a strict rule set (every posting field non-empty)
    pub fn strict() -> Self {
        Self::new(
            JOB_POSTING_FIELDS.iter().copied(),
            vec![
                vec!["requirements".to_string(), "responsibilities".to_string()],
                vec!["skills".to_string(), "preferred_qualifications".to_string()],
            ],
        )
    }

    /// Check the rule set for mistakes that would make every verdict fail
    pub fn validate(&self) -> Result<(), GatekeeperError> {
        if let Some(key) = self.require_keys.iter().find(|k| k.trim().is_empty()) {
            return Err(GatekeeperError::Config(format!(
                "require_keys contains a blank field name: {:?}",
                key
            )));
        }
        for (idx, group) in self.require_non_empty_any_of.iter().enumerate() {
            if group.is_empty() {
                return Err(GatekeeperError::Config(format!(
                    "require_non_empty_any_of group {} is empty",
                    idx
                )));
            }
        }
        Ok(())
    }

    /// Load rules from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, GatekeeperError> {
        let rules: Self = toml::from_str(toml_str)?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load rules from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GatekeeperError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GatekeeperError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Serialize rules to a TOML string
    pub fn to_toml(&self) -> Result<String, GatekeeperError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
