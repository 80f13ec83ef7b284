//! Extractor contract: backend call, salvage, schema validation

use crate::clean::clean_posting;
use crate::config::ExtractorConfig;
use crate::error::{BackendFailure, ExtractionError};
use crate::prompt::PromptTemplate;
use crate::salvage::SalvageParser;
use jobpulse_domain::{json_type_name, BackendInfo, SchemaContract, StructuredRecord};
use jobpulse_llm::GenerationBackend;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one extraction attempt
///
/// Exactly one of [`record`](Self::record) and [`error`](Self::error) is
/// present. Values are built by [`ExtractionResult::success`] or
/// [`ExtractionResult::failure`] and never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    record: Option<StructuredRecord>,
    raw_output: String,
    error: Option<ExtractionError>,
    repaired: bool,
    backend: BackendInfo,
    elapsed_ms: u64,
}

impl ExtractionResult {
    /// A validated record
    pub fn success(
        record: StructuredRecord,
        raw_output: impl Into<String>,
        repaired: bool,
        backend: BackendInfo,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            record: Some(record),
            raw_output: raw_output.into(),
            error: None,
            repaired,
            backend,
            elapsed_ms,
        }
    }

    /// A failed attempt; `raw_output` is empty if the backend produced nothing
    pub fn failure(
        error: ExtractionError,
        raw_output: impl Into<String>,
        backend: BackendInfo,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            record: None,
            raw_output: raw_output.into(),
            error: Some(error),
            repaired: false,
            backend,
            elapsed_ms,
        }
    }

    /// The validated record, if the attempt succeeded
    pub fn record(&self) -> Option<&StructuredRecord> {
        self.record.as_ref()
    }

    /// Raw backend completion
    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    /// Failure description, if the attempt failed
    pub fn error(&self) -> Option<&ExtractionError> {
        self.error.as_ref()
    }

    /// Whether salvage needed more than a direct parse
    pub fn repaired(&self) -> bool {
        self.repaired
    }

    /// Backend that served the attempt
    pub fn backend(&self) -> &BackendInfo {
        &self.backend
    }

    /// Wall time of the attempt in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Whether a record is present
    pub fn is_success(&self) -> bool {
        self.record.is_some()
    }

    /// Take the record out of the result
    pub fn into_record(self) -> Option<StructuredRecord> {
        self.record
    }
}

/// Check a salvaged object against a schema contract
///
/// Missing required keys are reported before list type mismatches.
pub fn validate_schema(
    schema: &SchemaContract,
    object: Map<String, Value>,
) -> Result<StructuredRecord, ExtractionError> {
    let missing: Vec<String> = schema
        .required
        .iter()
        .filter(|key| !object.contains_key(key.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ExtractionError::MissingFields(missing));
    }

    let bad: Vec<(String, String)> = schema
        .list_fields
        .iter()
        .filter_map(|key| match object.get(key.as_str()) {
            Some(value) if !value.is_array() => {
                Some((key.clone(), json_type_name(value).to_string()))
            }
            _ => None,
        })
        .collect();
    if !bad.is_empty() {
        return Err(ExtractionError::BadListType(bad));
    }

    Ok(StructuredRecord::from(object))
}

/// Backend-agnostic extraction: generate, salvage, validate
///
/// No retries happen here; the orchestrator owns retry and fallback policy.
///
/// # Examples
///
/// ```
/// use jobpulse_domain::SchemaContract;
/// use jobpulse_extractor::{ExtractorConfig, ExtractorContract};
/// use jobpulse_llm::MockProvider;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let backend = Arc::new(MockProvider::new("```json\n{\"title\": \"SWE\", \"skills\": [\"Rust\"]}\n```"));
/// let schema = SchemaContract::new(["title", "skills"], ["skills"]);
/// let contract = ExtractorContract::new(backend, schema, ExtractorConfig::default());
///
/// let result = rt.block_on(contract.extract("prompt", &CancellationToken::new()));
/// assert!(result.is_success());
/// assert!(result.repaired());
/// ```
pub struct ExtractorContract {
    backend: Arc<dyn GenerationBackend>,
    schema: SchemaContract,
    config: ExtractorConfig,
    template: PromptTemplate,
    parser: SalvageParser,
}

impl ExtractorContract {
    /// Create a contract over a backend
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        schema: SchemaContract,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            backend,
            schema,
            template: PromptTemplate::builtin(config.prompt_version),
            parser: SalvageParser::new(config.max_append),
            config,
        }
    }

    /// Use a custom prompt template for [`extract_posting`](Self::extract_posting)
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Description of the wrapped backend
    pub fn backend_info(&self) -> BackendInfo {
        self.backend.info()
    }

    /// The schema contract in force
    pub fn schema(&self) -> &SchemaContract {
        &self.schema
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Name of the prompt template in use
    pub fn template_name(&self) -> &str {
        self.template.name()
    }

    /// Run one attempt for a fully built prompt
    pub async fn extract(&self, prompt: &str, cancel: &CancellationToken) -> ExtractionResult {
        let started = Instant::now();
        let backend = self.backend.info();

        // 1. Call the backend
        let raw = match self.call_backend(prompt, cancel).await {
            Ok(raw) => raw,
            Err(failure) => {
                warn!(backend = %backend, "Backend call failed: {}", failure);
                return ExtractionResult::failure(
                    ExtractionError::Backend(failure),
                    String::new(),
                    backend,
                    elapsed_ms(started),
                );
            }
        };
        debug!(backend = %backend, chars = raw.len(), "Backend returned completion");

        // 2. Salvage a JSON object
        let salvaged = match self.parser.parse(&raw) {
            Ok(salvaged) => salvaged,
            Err(err) => {
                warn!(backend = %backend, reason = %err.reason, "No JSON object in completion");
                return ExtractionResult::failure(
                    ExtractionError::Parse {
                        reason: err.reason,
                        attempted: err.attempted,
                    },
                    raw,
                    backend,
                    elapsed_ms(started),
                );
            }
        };
        let repaired = salvaged.repaired();

        // 3. Validate against the schema
        match validate_schema(&self.schema, salvaged.object) {
            Ok(record) => {
                info!(
                    backend = %backend,
                    fields = record.len(),
                    repaired,
                    phase = %salvaged.phase,
                    "Extraction succeeded"
                );
                ExtractionResult::success(record, raw, repaired, backend, elapsed_ms(started))
            }
            Err(err) => {
                warn!(backend = %backend, kind = err.kind(), "{}", err);
                ExtractionResult::failure(err, raw, backend, elapsed_ms(started))
            }
        }
    }

    /// Clean a posting, render the prompt template, and run one attempt
    pub async fn extract_posting(
        &self,
        posting_text: &str,
        cancel: &CancellationToken,
    ) -> ExtractionResult {
        let text = if self.config.clean_input {
            clean_posting(posting_text)
        } else {
            posting_text.trim().to_string()
        };

        let length = text.chars().count();
        if length > self.config.max_text_length {
            warn!(length, max = self.config.max_text_length, "Posting too long, skipping backend");
            return ExtractionResult::failure(
                ExtractionError::InputTooLong(length, self.config.max_text_length),
                String::new(),
                self.backend.info(),
                0,
            );
        }

        let prompt = self.template.render(&text);
        debug!(
            template = self.template.name(),
            prompt_chars = prompt.len(),
            "Rendered extraction prompt"
        );
        self.extract(&prompt, cancel).await
    }

    /// Generate with a timeout, racing the cancellation token
    async fn call_backend(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, BackendFailure> {
        if cancel.is_cancelled() {
            return Err(BackendFailure::Cancelled);
        }

        let call = tokio::time::timeout(self.config.backend_timeout(), self.backend.generate(prompt));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BackendFailure::Cancelled),
            result = call => match result {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(BackendFailure::Error(e.to_string())),
                Err(_) => Err(BackendFailure::Timeout(self.config.backend_timeout_secs)),
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::salvage::SalvageFailure;
    use jobpulse_llm::MockProvider;
    use serde_json::json;
    use std::time::Duration;

    fn title_skills() -> SchemaContract {
        SchemaContract::new(["title", "skills"], ["skills"])
    }

    fn contract(provider: &MockProvider, schema: SchemaContract) -> ExtractorContract {
        ExtractorContract::new(Arc::new(provider.clone()), schema, ExtractorConfig::default())
    }

    #[test]
    fn test_validate_schema_missing_fields() {
        let object = json!({"skills": ["Rust"]}).as_object().cloned().unwrap();
        let err = validate_schema(&title_skills(), object).unwrap_err();
        assert_eq!(err, ExtractionError::MissingFields(vec!["title".to_string()]));
        assert_eq!(err.kind(), "schema_missing_fields");
    }

    #[test]
    fn test_validate_schema_bad_list_type() {
        let object = json!({"title": "SWE", "skills": "Rust"}).as_object().cloned().unwrap();
        let err = validate_schema(&title_skills(), object).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::BadListType(vec![("skills".to_string(), "string".to_string())])
        );
        assert_eq!(err.kind(), "schema_bad_list_type");
    }

    #[test]
    fn test_validate_schema_missing_reported_before_types() {
        let object = json!({"skills": 3}).as_object().cloned().unwrap();
        let err = validate_schema(&title_skills(), object).unwrap_err();
        assert_eq!(err.kind(), "schema_missing_fields");
    }

    #[test]
    fn test_absent_optional_list_field_is_fine() {
        let schema = SchemaContract::new(["title"], ["skills"]);
        let object = json!({"title": "SWE"}).as_object().cloned().unwrap();
        assert!(validate_schema(&schema, object).is_ok());
    }

    #[test]
    fn test_empty_contract_accepts_anything() {
        let object = json!({"x": 1}).as_object().cloned().unwrap();
        let record = validate_schema(&SchemaContract::permissive(), object).unwrap();
        assert_eq!(record.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_success() {
        let provider = MockProvider::new(r#"{"title": "SWE", "skills": ["Rust", "Go"]}"#);
        let result = contract(&provider, title_skills())
            .extract("prompt", &CancellationToken::new())
            .await;

        assert!(result.is_success());
        assert!(result.error().is_none());
        assert!(!result.repaired());
        assert_eq!(result.record().unwrap().text("title"), Some("SWE"));
        assert_eq!(result.backend().provider, "mock");
        assert_eq!(provider.prompts(), vec!["prompt"]);
    }

    #[tokio::test]
    async fn test_extract_repaired_flag() {
        let provider = MockProvider::new("{\"title\": \"SWE\", \"skills\": [\"Rust\"]}\nHope this helps!");
        let result = contract(&provider, title_skills())
            .extract("p", &CancellationToken::new())
            .await;
        assert!(result.is_success());
        assert!(result.repaired());
    }

    #[tokio::test]
    async fn test_backend_error_has_empty_raw_output() {
        let provider = MockProvider::failing("connection refused");
        let result = contract(&provider, title_skills())
            .extract("p", &CancellationToken::new())
            .await;

        assert!(!result.is_success());
        assert_eq!(result.raw_output(), "");
        let err = result.error().unwrap();
        assert_eq!(err.kind(), "backend_failure");
        assert_eq!(err.sub_reason(), Some("error"));
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_raw_output() {
        let provider = MockProvider::new("I could not find any job details.");
        let result = contract(&provider, title_skills())
            .extract("p", &CancellationToken::new())
            .await;

        assert_eq!(result.raw_output(), "I could not find any job details.");
        assert!(matches!(
            result.error(),
            Some(ExtractionError::Parse {
                reason: SalvageFailure::NoObjectFound,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_schema_failure_keeps_raw_output() {
        let raw = r#"{"title": "SWE", "skills": "Rust, Go"}"#;
        let provider = MockProvider::new(raw);
        let result = contract(&provider, title_skills())
            .extract("p", &CancellationToken::new())
            .await;

        assert!(result.record().is_none());
        assert_eq!(result.raw_output(), raw);
        assert_eq!(result.error().unwrap().kind(), "schema_bad_list_type");
    }

    #[tokio::test]
    async fn test_timeout_is_backend_failure() {
        let provider = MockProvider::new("{}").with_delay(Duration::from_secs(5));
        let config = ExtractorConfig {
            backend_timeout_secs: 1,
            ..Default::default()
        };
        let contract = ExtractorContract::new(Arc::new(provider), SchemaContract::permissive(), config);

        let result = contract.extract("p", &CancellationToken::new()).await;
        assert_eq!(
            result.error(),
            Some(&ExtractionError::Backend(BackendFailure::Timeout(1)))
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let provider = MockProvider::new("{}");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = contract(&provider, SchemaContract::permissive())
            .extract("p", &cancel)
            .await;
        assert_eq!(
            result.error(),
            Some(&ExtractionError::Backend(BackendFailure::Cancelled))
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_during_call() {
        let provider = MockProvider::new("{}").with_delay(Duration::from_secs(30));
        let contract = contract(&provider, SchemaContract::permissive());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = contract.extract("p", &cancel).await;
        assert_eq!(result.error().unwrap().sub_reason(), Some("cancelled"));
        assert!(result.elapsed_ms() < 30_000);
    }

    #[tokio::test]
    async fn test_extract_posting_cleans_and_renders() {
        let provider = MockProvider::new(r#"{"title": "SWE", "skills": []}"#);
        let contract = contract(&provider, title_skills());

        let result = contract
            .extract_posting("Rust Engineer\nApply\nShow more\n\nBuild   things", &CancellationToken::new())
            .await;
        assert!(result.is_success());

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("Rust Engineer\n\nBuild things"));
        assert!(!prompt.contains("Show more"));
        assert!(!prompt.contains("{{JOB_DESCRIPTION}}"));
    }

    #[tokio::test]
    async fn test_extract_posting_too_long_skips_backend() {
        let provider = MockProvider::new("{}");
        let config = ExtractorConfig {
            max_text_length: 10,
            ..Default::default()
        };
        let contract = ExtractorContract::new(Arc::new(provider.clone()), SchemaContract::permissive(), config);

        let result = contract
            .extract_posting("a posting longer than ten characters", &CancellationToken::new())
            .await;
        assert_eq!(result.error().unwrap().kind(), "input_too_long");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_template() {
        let provider = MockProvider::new("{}");
        let template = PromptTemplate::new("custom", "JD >>> {{JOB_DESCRIPTION}} <<<").unwrap();
        let contract = contract(&provider, SchemaContract::permissive()).with_template(template);
        assert_eq!(contract.template_name(), "custom");

        contract
            .extract_posting("Data Analyst", &CancellationToken::new())
            .await;
        assert_eq!(provider.prompts(), vec!["JD >>> Data Analyst <<<"]);
    }
}
