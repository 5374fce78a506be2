//! LLM provider abstraction and implementations

mod ollama;
mod openai;

pub use ollama::OllamaProvider;
pub use openai::{upgraded_model, OpenAiCompatibleProvider};

use crate::ProviderConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when interacting with an LLM provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Provider returned error: {0}")]
    ProviderError(String),

    #[error("Provider returned an empty completion")]
    EmptyResponse,

    #[error("No API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("Unknown provider type '{0}'")]
    UnknownProvider(String),
}

/// Request to send to an LLM
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt
    pub system: String,

    /// User message/prompt
    pub prompt: String,

    /// Temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Ask the backend to constrain its output to a JSON object
    pub json_output: bool,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            json_output: false,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Response from an LLM
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Token usage statistics
    pub usage: Option<TokenUsage>,

    /// Time taken for generation (ms)
    pub duration_ms: Option<u64>,
}

/// Token usage statistics
#[derive(Debug, Clone, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Health status of a provider
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name for logging/identification
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;

    /// Send a completion request to the LLM
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> HealthStatus;
}

/// Build the provider described by `config`
pub fn from_config(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let kind = config.provider_type.as_str();

    let provider: Arc<dyn LlmProvider> = match kind {
        "ollama" => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| ollama::DEFAULT_BASE_URL.to_string());
            Arc::new(OllamaProvider::new(base_url, &config.model))
        }
        "openai" | "groq" | "deepseek" | "litellm" => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ProviderError::MissingApiKey(kind.to_string()))?;
            let base_url = config
                .base_url
                .clone()
                .or_else(|| openai::default_base_url(kind).map(str::to_string))
                .ok_or_else(|| ProviderError::UnknownProvider(kind.to_string()))?;
            Arc::new(OpenAiCompatibleProvider::new(kind, base_url, api_key, &config.model))
        }
        other => return Err(ProviderError::UnknownProvider(other.to_string())),
    };

    info!(
        provider = provider.name(),
        model = provider.model(),
        "Configured LLM provider"
    );
    Ok(provider)
}
