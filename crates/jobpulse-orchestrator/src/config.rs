//! Pipeline configuration
//!
//! Loads the whole pipeline from one TOML file: fetch and artifact
//! directories, backend selection, extractor limits and QC rules. API keys
//! are never stored in the file; they come from the provider's environment
//! variable (`OPENAI_API_KEY`, `NVIDIA_API_KEY`).
//!
//! ```toml
//! local_first = true
//! source_hint = "handshake"
//! postings_dir = "data/raw/jd_txt"
//! artifacts_dir = "data/runs"
//!
//! [extractor]
//! backend_timeout_secs = 60
//!
//! [local]
//! model = "qwen2.5:0.5b-instruct"
//!
//! [api]
//! provider = "nvidia"
//!
//! [report]
//! provider = "openai"
//! ```

use crate::fetch::DEFAULT_POSTINGS_DIR;
use crate::report::REPORT_SYSTEM_PROMPT;
use crate::ConfigError;
use jobpulse_extractor::ExtractorConfig;
use jobpulse_gatekeeper::QcRules;
use jobpulse_llm::{GenerationBackend, LlmError, OllamaProvider, OpenAiCompatProvider, ProviderPreset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Top-level pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Try the local backend before the API backend
    pub local_first: bool,

    /// Default source hint passed to the fetcher
    pub source_hint: Option<String>,

    /// Directory of `<job_id>.txt` posting files
    pub postings_dir: PathBuf,

    /// Directory for per-job artifacts; `None` disables persistence
    pub artifacts_dir: Option<PathBuf>,

    /// Maximum jobs in flight during a batch
    pub batch_concurrency: usize,

    /// Extractor limits and prompt selection
    pub extractor: ExtractorConfig,

    /// Quality gate rules
    pub qc: QcRules,

    /// Local backend; `None` means API only
    pub local: Option<LocalBackendConfig>,

    /// API backend
    pub api: ApiBackendConfig,

    /// Report backend; `None` skips report generation
    pub report: Option<ReportConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            local_first: false,
            source_hint: Some("handshake".to_string()),
            postings_dir: PathBuf::from(DEFAULT_POSTINGS_DIR),
            artifacts_dir: None,
            batch_concurrency: 4,
            extractor: ExtractorConfig::default(),
            qc: QcRules::default(),
            local: None,
            api: ApiBackendConfig::default(),
            report: None,
        }
    }
}

impl PipelineConfig {
    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "batch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.local_first && self.local.is_none() {
            tracing::warn!("local_first is set but no [local] backend is configured; using the API backend");
        }
        self.extractor.validate()?;
        self.qc.validate()?;
        self.api.preset()?;
        if let Some(report) = &self.report {
            report.preset()?;
        }
        Ok(())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Local model served by Ollama
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    /// Ollama endpoint
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Ask Ollama to constrain output to JSON
    pub json_mode: bool,

    /// Attempts per call
    pub max_retries: u32,

    /// Completion token budget
    pub max_tokens: u32,

    /// Transport timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: jobpulse_llm::ollama::DEFAULT_ENDPOINT.to_string(),
            model: "qwen2.5:0.5b-instruct".to_string(),
            json_mode: false,
            max_retries: 1,
            max_tokens: 1200,
            timeout_secs: jobpulse_llm::ollama::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LocalBackendConfig {
    /// Build the backend
    pub fn build(&self) -> Result<Arc<dyn GenerationBackend>, LlmError> {
        let provider = OllamaProvider::with_timeout(
            &self.endpoint,
            &self.model,
            Duration::from_secs(self.timeout_secs),
        )?
        .with_max_retries(self.max_retries)
        .with_max_tokens(self.max_tokens)
        .with_json_mode(self.json_mode);
        Ok(Arc::new(provider))
    }
}

/// Remote OpenAI-compatible API used for extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiBackendConfig {
    /// Provider preset (`openai` or `nvidia`)
    pub provider: String,

    /// Model override; the preset's default when unset
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion token budget
    pub max_tokens: u32,

    /// Attempts per call
    pub max_retries: u32,
}

impl Default for ApiBackendConfig {
    fn default() -> Self {
        Self {
            provider: ProviderPreset::OpenAi.name().to_string(),
            model: None,
            temperature: 0.0,
            max_tokens: 1200,
            max_retries: 3,
        }
    }
}

impl ApiBackendConfig {
    /// Resolve the provider preset
    pub fn preset(&self) -> Result<ProviderPreset, ConfigError> {
        self.provider
            .parse()
            .map_err(|e: LlmError| ConfigError::Invalid(format!("[api] {}", e)))
    }

    /// Build the backend, reading credentials through `lookup`
    pub fn build_with<F>(&self, lookup: F) -> Result<Arc<dyn GenerationBackend>, crate::PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = OpenAiCompatProvider::from_lookup(self.preset()?, self.model.as_deref(), lookup)?
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_max_retries(self.max_retries);
        Ok(Arc::new(provider))
    }
}

/// Remote API used for report generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Provider preset (`openai` or `nvidia`)
    pub provider: String,

    /// Model override
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion token budget
    pub max_tokens: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            provider: ProviderPreset::OpenAi.name().to_string(),
            model: None,
            temperature: 0.2,
            max_tokens: 900,
        }
    }
}

impl ReportConfig {
    /// Resolve the provider preset
    pub fn preset(&self) -> Result<ProviderPreset, ConfigError> {
        self.provider
            .parse()
            .map_err(|e: LlmError| ConfigError::Invalid(format!("[report] {}", e)))
    }

    /// Build the report backend, reading credentials through `lookup`
    pub fn build_with<F>(&self, lookup: F) -> Result<Arc<dyn GenerationBackend>, crate::PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = OpenAiCompatProvider::from_lookup(self.preset()?, self.model.as_deref(), lookup)?
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_system_prompt(Some(REPORT_SYSTEM_PROMPT.to_string()));
        Ok(Arc::new(provider))
    }
}
