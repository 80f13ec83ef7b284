//! JobPulse LLM Provider Layer
//!
//! Pluggable generation backends behind one async interface.
//!
//! # Architecture
//!
//! Every backend implements [`GenerationBackend`]: it takes a prompt and
//! returns raw completion text, with no structural guarantees. Parsing and
//! validation happen in `jobpulse-extractor`; retry policy across backends
//! lives in `jobpulse-orchestrator`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable mock for testing
//! - `OllamaProvider`: Locally hosted model served by Ollama
//! - `OpenAiCompatProvider`: Remote OpenAI-compatible chat completions API
//!
//! # Examples
//!
//! ```
//! use jobpulse_llm::{GenerationBackend, MockProvider};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let provider = MockProvider::new(r#"{"role_title": "SWE"}"#);
//! let result = rt.block_on(provider.generate("test prompt")).unwrap();
//! assert_eq!(result, r#"{"role_title": "SWE"}"#);
//! ```

#![warn(missing_docs)]

pub mod ollama;
pub mod openai_compat;

use async_trait::async_trait;
use jobpulse_domain::{BackendInfo, BackendKind};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAiCompatProvider, ProviderPreset};

/// Errors that can occur during LLM operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// API key environment variable is unset or empty
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),

    /// Client could not be constructed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// A text-completion backend
///
/// Implementations may fail with transport or runtime errors and make no
/// promise about determinism or output structure. Calls may take a long
/// time; callers bound them with a timeout.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Describe this backend for traces and verdicts
    fn info(&self) -> BackendInfo;

    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Exponential backoff delay before retry `attempt` (1-based): 1s, 2s, 4s, ...
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt.saturating_sub(1).min(6)))
}

/// Scripted outcome for a [`MockProvider`] call
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this completion text
    Text(String),

    /// Fail with [`LlmError::Other`] carrying this message
    Error(String),
}

/// Mock LLM provider for deterministic testing
///
/// Replies are chosen in this order: the next queued reply (see
/// [`MockProvider::push_reply`]), then a reply registered for the exact
/// prompt, then the default response. No network calls are made.
///
/// # Examples
///
/// ```
/// use jobpulse_llm::{GenerationBackend, MockProvider};
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
///
/// // Simple fixed response
/// let provider = MockProvider::new("Fixed response");
/// assert_eq!(rt.block_on(provider.generate("any prompt")).unwrap(), "Fixed response");
///
/// // Queued replies are consumed first
/// let provider = MockProvider::new("later");
/// provider.push_text("first");
/// provider.push_error("backend down");
/// assert_eq!(rt.block_on(provider.generate("p")).unwrap(), "first");
/// assert!(rt.block_on(provider.generate("p")).is_err());
/// assert_eq!(rt.block_on(provider.generate("p")).unwrap(), "later");
/// assert_eq!(provider.call_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    responses: Arc<Mutex<HashMap<String, MockReply>>>,
    queue: Arc<Mutex<VecDeque<MockReply>>>,
    call_count: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
    fail_all: Option<String>,
    delay: Option<Duration>,
    info: BackendInfo,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            responses: Arc::new(Mutex::new(HashMap::new())),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            fail_all: None,
            delay: None,
            info: BackendInfo::new(BackendKind::Local, "mock", "mock-model"),
        }
    }

    /// Create a mock that fails every call
    pub fn failing(message: impl Into<String>) -> Self {
        let mut provider = Self::new(String::new());
        provider.fail_all = Some(message.into());
        provider
    }

    /// Report this mock as the given backend kind
    pub fn with_kind(mut self, kind: BackendKind) -> Self {
        self.info.kind = kind;
        self
    }

    /// Report this mock under the given model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.info.model = model.into();
        self
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&self, prompt: impl Into<String>, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prompt.into(), MockReply::Text(response.into()));
    }

    /// Configure to return an error for a specific prompt
    pub fn add_error(&self, prompt: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prompt.into(), MockReply::Error("Mock error".to_string()));
    }

    /// Queue a reply to be returned by the next unanswered call
    pub fn push_reply(&self, reply: MockReply) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Queue a successful completion
    pub fn push_text(&self, text: impl Into<String>) {
        self.push_reply(MockReply::Text(text.into()));
    }

    /// Queue a failure
    pub fn push_error(&self, message: impl Into<String>) {
        self.push_reply(MockReply::Error(message.into()));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some(reply) = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return reply;
        }

        let responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(reply) = responses.get(prompt) {
            return reply.clone();
        }

        match &self.fail_all {
            Some(message) => MockReply::Error(message.clone()),
            None => MockReply::Text(self.default_response.clone()),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

#[async_trait]
impl GenerationBackend for MockProvider {
    fn info(&self) -> BackendInfo {
        self.info.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(prompt) {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(LlmError::Other(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        let result = provider.generate("any prompt").await;
        assert_eq!(result.unwrap(), "Test response");
    }

    #[tokio::test]
    async fn test_mock_provider_specific_responses() {
        let provider = MockProvider::default();
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.generate("hello").await.unwrap(), "world");
        assert_eq!(provider.generate("foo").await.unwrap(), "bar");
        assert_eq!(
            provider.generate("unknown").await.unwrap(),
            "Default mock response"
        );
    }

    #[tokio::test]
    async fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");

        assert_eq!(provider.call_count(), 0);

        provider.generate("prompt1").await.unwrap();
        assert_eq!(provider.call_count(), 1);

        provider.generate("prompt2").await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.prompts(), vec!["prompt1", "prompt2"]);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_provider_error() {
        let provider = MockProvider::default();
        provider.add_error("bad prompt");

        let result = provider.generate("bad prompt").await;
        assert!(matches!(result, Err(LlmError::Other(_))));
    }

    #[tokio::test]
    async fn test_mock_provider_queue_precedes_prompt_map() {
        let provider = MockProvider::new("default");
        provider.add_response("p", "mapped");
        provider.push_text("queued");

        assert_eq!(provider.generate("p").await.unwrap(), "queued");
        assert_eq!(provider.generate("p").await.unwrap(), "mapped");
    }

    #[tokio::test]
    async fn test_mock_provider_failing() {
        let provider = MockProvider::failing("offline");
        for _ in 0..3 {
            let err = provider.generate("anything").await.unwrap_err();
            assert_eq!(err, LlmError::Other("offline".to_string()));
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.generate("test").await.unwrap();

        // Both should share the same call count due to Arc
        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
    }

    #[test]
    fn test_mock_provider_info() {
        let provider = MockProvider::new("x")
            .with_kind(BackendKind::Api)
            .with_model("scripted");
        let info = provider.info();
        assert_eq!(info.kind, BackendKind::Api);
        assert_eq!(info.provider, "mock");
        assert_eq!(info.model, "scripted");
    }

    #[test]
    fn test_backoff_delay_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(40), Duration::from_secs(64));
    }
}
