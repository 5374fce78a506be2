//! Ollama provider for locally hosted models

use super::{HealthStatus, LlmProvider, LlmRequest, LlmResponse, ProviderError, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama provider using the `/api/generate` endpoint
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    name: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            name: format!("ollama:{}", model),
            model,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    /// Nanoseconds
    #[serde(default)]
    total_duration: Option<u64>,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            format: request.json_output.then_some("json"),
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let start = Instant::now();
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ProviderError(format!(
                "HTTP {}: {}",
                status, text
            )));
        }

        let generated: GenerateResponse = response.json().await?;
        if generated.response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let duration_ms = generated
            .total_duration
            .map(|ns| ns / 1_000_000)
            .unwrap_or_else(|| start.elapsed().as_millis() as u64);

        let usage = match (generated.prompt_eval_count, generated.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        Ok(LlmResponse {
            content: generated.response,
            usage,
            duration_ms: Some(duration_ms),
        })
    }

    async fn health_check(&self) -> HealthStatus {
        let url = format!("{}/api/tags", self.base_url);
        let start = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus {
                healthy: true,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Ok(response) => HealthStatus {
                healthy: false,
                latency_ms: None,
                error: Some(format!("HTTP {}", response.status())),
            },
            Err(e) => HealthStatus {
                healthy: false,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434/", "qwen2.5:7b");
        assert_eq!(provider.model(), "qwen2.5:7b");
        assert_eq!(provider.name(), "ollama:qwen2.5:7b");
    }

    #[tokio::test]
    async fn test_generate_in_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({"model": "qwen2.5:7b", "format": "json", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "{\"partes\": []}",
                "prompt_eval_count": 40,
                "eval_count": 8,
                "total_duration": 2_000_000_000u64
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(server.uri(), "qwen2.5:7b");
        let response = provider
            .complete(&LlmRequest::new("s", "p").with_json_output())
            .await
            .unwrap();

        assert_eq!(response.content, "{\"partes\": []}");
        assert_eq!(response.duration_ms, Some(2000));
        assert_eq!(response.usage.unwrap().total_tokens, 48);
    }

    #[tokio::test]
    async fn test_blank_generation_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "  "})))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(server.uri(), "qwen2.5:7b");
        let err = provider.complete(&LlmRequest::new("s", "p")).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_health_check_lists_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;

        let status = OllamaProvider::new(server.uri(), "qwen2.5:7b").health_check().await;
        assert!(status.healthy);
        assert!(status.latency_ms.is_some());

        let down = OllamaProvider::new("http://127.0.0.1:1", "qwen2.5:7b").health_check().await;
        assert!(!down.healthy);
        assert!(down.error.is_some());
    }
}
