//! OpenAI-compatible chat completions provider
//!
//! The API backend. Works against any service that speaks the
//! `/v1/chat/completions` protocol; two presets are built in:
//!
//! | Preset   | Base URL                              | Key env var      | Default model          |
//! |----------|---------------------------------------|------------------|------------------------|
//! | `openai` | `https://api.openai.com`              | `OPENAI_API_KEY` | `gpt-4o-mini`          |
//! | `nvidia` | `https://integrate.api.nvidia.com/v1` | `NVIDIA_API_KEY` | `moonshotai/kimi-k2.5` |
//!
//! The base URL of a preset can be overridden with `<PROVIDER>_BASE_URL`
//! (e.g. `OPENAI_BASE_URL`).

use crate::{backoff_delay, GenerationBackend, LlmError};
use async_trait::async_trait;
use jobpulse_domain::{BackendInfo, BackendKind};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Default transport timeout for a single request (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Default number of attempts per generate call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default system prompt for extraction calls
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are an information extraction system. \
Return ONLY valid JSON matching the given schema. \
Do not include any explanation, markdown, or extra text.";

/// Built-in provider presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderPreset {
    /// api.openai.com
    OpenAi,

    /// NVIDIA integrate API
    Nvidia,
}

impl ProviderPreset {
    /// Provider name as used in config files and trace metadata
    pub fn name(&self) -> &'static str {
        match self {
            ProviderPreset::OpenAi => "openai",
            ProviderPreset::Nvidia => "nvidia",
        }
    }

    /// Default base URL
    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderPreset::OpenAi => "https://api.openai.com",
            ProviderPreset::Nvidia => "https://integrate.api.nvidia.com/v1",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderPreset::OpenAi => "OPENAI_API_KEY",
            ProviderPreset::Nvidia => "NVIDIA_API_KEY",
        }
    }

    /// Environment variable overriding the base URL
    pub fn base_url_env(&self) -> String {
        format!("{}_BASE_URL", self.name().to_uppercase())
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderPreset::OpenAi => "gpt-4o-mini",
            ProviderPreset::Nvidia => "moonshotai/kimi-k2.5",
        }
    }
}

impl fmt::Display for ProviderPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProviderPreset {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderPreset::OpenAi),
            "nvidia" => Ok(ProviderPreset::Nvidia),
            other => Err(LlmError::Config(format!("Unknown provider: {}", other))),
        }
    }
}

/// Build the chat completions URL for a base URL
///
/// Base URLs that already end in `/v1` get `/chat/completions`; all others
/// get `/v1/chat/completions`.
pub fn chat_completions_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/chat/completions", base)
    } else {
        format!("{}/v1/chat/completions", base)
    }
}

/// Pull the assistant text out of a chat completions response
///
/// Tries, in order: `message.content` as a string, `message.content` as a
/// list of parts, the non-blank `reasoning_content` / `reasoning` /
/// `output_text` / `text` fields of the message, and finally the choice's
/// own `text`. Returns an empty string when nothing matches.
pub fn message_text(response: &Value) -> String {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .unwrap_or(&Value::Null);
    let message = choice.get("message").unwrap_or(&Value::Null);

    match message.get("content") {
        Some(Value::String(content)) => return content.clone(),
        Some(Value::Array(parts)) => {
            return parts
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.as_str(),
                    Value::Object(_) => part
                        .get("text")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .or_else(|| part.get("content").and_then(Value::as_str))
                        .unwrap_or(""),
                    _ => "",
                })
                .collect();
        }
        _ => {}
    }

    for key in ["reasoning_content", "reasoning", "output_text", "text"] {
        if let Some(text) = message.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return text.to_string();
            }
        }
    }

    choice
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(String::from)
        .unwrap_or_default()
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

/// Remote OpenAI-compatible chat completions backend
#[derive(Debug, Clone)]
pub struct OpenAiCompatProvider {
    provider: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    temperature: f32,
    max_tokens: u32,
    system_prompt: Option<String>,
}

impl OpenAiCompatProvider {
    /// Create a provider for an arbitrary compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::MissingApiKey`] if `api_key` is blank and
    /// [`LlmError::Config`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey("api_key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider: "openai_compat".to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: 0.0,
            max_tokens: 1200,
            system_prompt: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
        })
    }

    /// Create a provider from a preset, reading the API key and optional
    /// base URL override from the process environment
    pub fn from_env(preset: ProviderPreset, model: Option<&str>) -> Result<Self, LlmError> {
        Self::from_lookup(preset, model, |key| std::env::var(key).ok())
    }

    /// Create a provider from a preset with a custom variable lookup
    pub fn from_lookup<F>(
        preset: ProviderPreset,
        model: Option<&str>,
        lookup: F,
    ) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(preset.api_key_env())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(preset.api_key_env().to_string()))?;
        let base_url = lookup(&preset.base_url_env())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| preset.base_url().to_string());
        let model = model.unwrap_or(preset.default_model());

        let mut provider = Self::new(base_url, api_key, model)?;
        provider.provider = preset.name().to_string();
        Ok(provider)
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replace the system prompt (`None` sends only the user message)
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Resolved chat completions URL
    pub fn url(&self) -> String {
        chat_completions_url(&self.base_url)
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    async fn chat_completions(&self, prompt: &str) -> Result<Value, LlmError> {
        let url = self.url();
        let body = self.request_body(prompt);

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        });
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status.is_server_error() {
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {} from {}: {}",
                            status, url, error_text
                        )));
                    } else {
                        // Client errors will not improve on retry
                        return Err(LlmError::Communication(format!(
                            "HTTP {} from {}: {}",
                            status, url, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                let delay = backoff_delay(attempts);
                warn!(
                    provider = %self.provider,
                    attempt = attempts,
                    "Chat completion failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl GenerationBackend for OpenAiCompatProvider {
    fn info(&self) -> BackendInfo {
        BackendInfo::new(BackendKind::Api, self.provider.clone(), self.model.clone())
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(
            provider = %self.provider,
            model = %self.model,
            prompt_chars = prompt.len(),
            "Calling chat completions"
        );
        let response = self.chat_completions(prompt).await?;
        Ok(message_text(&response))
    }
}
