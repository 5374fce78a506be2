//! Contract analysis over a language model

mod normalize;
pub mod prompts;

pub use normalize::{
    clean_output, ensure_schema, format_brl, is_empty_result, normalize_amounts,
    parse_brl_amount, parse_lenient, SCHEMA_KEYS,
};

use crate::provider::{HealthStatus, LlmProvider, LlmRequest, ProviderError};
use crate::retrieval;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Characters per chunk when selecting context for a question
const QA_CHUNK_CHARS: usize = 1400;
/// Chunks handed to the model as context for a question
const QA_TOP_K: usize = 5;

/// Errors from contract analysis
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Falha na análise: {0}")]
    Provider(#[from] ProviderError),
}

/// Runs the extraction prompt against a provider and shapes the result
pub struct ContractAnalyzer {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl ContractAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the model backend whether it is reachable
    pub async fn provider_health(&self) -> HealthStatus {
        self.provider.health_check().await
    }

    /// Analyze `contract_text` and return the structured result.
    ///
    /// When the first answer carries no usable content the model is asked
    /// once more with a stricter prompt and a slightly lower temperature.
    /// The returned object always has every key in [`SCHEMA_KEYS`].
    pub async fn analyze(&self, contract_text: &str) -> Result<Value, AnalyzerError> {
        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            chars = contract_text.len(),
            "Analyzing contract"
        );

        let user_prompt = prompts::extraction_user_prompt(contract_text);
        let request = LlmRequest::new(prompts::EXTRACTION_SYSTEM_PROMPT, user_prompt.as_str())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_output();

        let mut data = self.complete_json(&request).await?;

        if is_empty_result(&data) {
            warn!("Empty analysis from model, retrying with strict prompt");
            let strict = LlmRequest::new(
                format!("{}{}", prompts::EXTRACTION_SYSTEM_PROMPT, prompts::STRICT_SYSTEM_SUFFIX),
                format!("{}{}", user_prompt, prompts::STRICT_USER_SUFFIX),
            )
            .with_temperature((self.temperature - 0.1).max(0.0))
            .with_max_tokens(self.max_tokens)
            .with_json_output();

            data = self.complete_json(&strict).await?;
        }

        let analysis = normalize_amounts(ensure_schema(data));
        debug!(
            partes = analysis["partes"].as_array().map_or(0, Vec::len),
            datas = analysis["datas_vencimento"].as_array().map_or(0, Vec::len),
            "Analysis complete"
        );
        Ok(analysis)
    }

    /// Run one JSON-mode completion; a blank completion counts as an empty object
    async fn complete_json(&self, request: &LlmRequest) -> Result<Value, AnalyzerError> {
        match self.provider.complete(request).await {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        total_tokens = usage.total_tokens,
                        duration_ms = response.duration_ms,
                        "Model usage"
                    );
                }
                Ok(parse_lenient(&clean_output(&response.content)))
            }
            Err(ProviderError::EmptyResponse) => Ok(Value::Object(Map::new())),
            Err(e) => Err(e.into()),
        }
    }

    /// Answer a question about the contract using its most relevant chunks
    pub async fn answer(&self, question: &str, contract_text: &str) -> Result<String, AnalyzerError> {
        let chunks = retrieval::chunk_text(contract_text, QA_CHUNK_CHARS);
        let top = retrieval::rank_chunks(question, &chunks, QA_TOP_K);
        debug!(chunks = chunks.len(), selected = top.len(), "Selected context for question");

        let context = top.join("\n\n");
        let request = LlmRequest::new(
            prompts::QA_SYSTEM_PROMPT,
            prompts::qa_user_prompt(question, &context),
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LlmResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned completions and records every request
    struct ScriptedProvider {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ProviderError::ProviderError("no more replies".to_string()))?;
            if content.is_empty() {
                return Err(ProviderError::EmptyResponse);
            }
            Ok(LlmResponse {
                content,
                usage: None,
                duration_ms: None,
            })
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus {
                healthy: true,
                latency_ms: None,
                error: None,
            }
        }
    }

    #[tokio::test]
    async fn test_analyze_single_pass() {
        let provider = ScriptedProvider::new(&[
            "```json\n{\"partes\": [{\"nome\": \"ACME Ltda\"}], \"valores_multas\": [{\"valor_monetario\": 1200.5}]}\n```",
        ]);
        let analyzer = ContractAnalyzer::new(provider.clone(), 0.2, 2000);

        let analysis = analyzer.analyze("CONTRATO").await.unwrap();

        assert_eq!(analysis["partes"][0]["nome"], "ACME Ltda");
        assert_eq!(analysis["valores_multas"][0]["valor_monetario"], "R$ 1.200,50");
        assert_eq!(analysis["valores_multas"][0]["moeda"], "BRL");
        assert_eq!(analysis["resumo_juridico"], "");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_output);
        assert_eq!(requests[0].system, prompts::EXTRACTION_SYSTEM_PROMPT);
        assert!(requests[0].prompt.ends_with("Contrato:\nCONTRATO"));
    }

    #[tokio::test]
    async fn test_analyze_retries_strictly_on_empty_result() {
        let provider = ScriptedProvider::new(&[
            "Não consegui identificar nada.",
            "{\"resumo_juridico\": \"Contrato de locação\"}",
        ]);
        let analyzer = ContractAnalyzer::new(provider.clone(), 0.05, 1000);

        let analysis = analyzer.analyze("CONTRATO").await.unwrap();
        assert_eq!(analysis["resumo_juridico"], "Contrato de locação");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].temperature, Some(0.0));
        assert!(requests[1].system.ends_with(prompts::STRICT_SYSTEM_SUFFIX));
        assert!(requests[1].prompt.ends_with(prompts::STRICT_USER_SUFFIX));
    }

    #[tokio::test]
    async fn test_analyze_returns_schema_even_when_retry_is_empty() {
        let provider = ScriptedProvider::new(&["nada", "ainda nada"]);
        let analyzer = ContractAnalyzer::new(provider, 0.2, 1000);

        let analysis = analyzer.analyze("CONTRATO").await.unwrap();
        let keys: Vec<_> = analysis.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), SCHEMA_KEYS.len());
        assert_eq!(analysis["analise_risco"], json!({}));
    }

    #[tokio::test]
    async fn test_blank_completion_triggers_strict_retry() {
        let provider = ScriptedProvider::new(&["", "{\"partes\": [{\"nome\": \"ACME\"}]}"]);
        let analyzer = ContractAnalyzer::new(provider.clone(), 0.2, 1000);

        let analysis = analyzer.analyze("CONTRATO").await.unwrap();
        assert_eq!(analysis["partes"][0]["nome"], "ACME");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].system.ends_with(prompts::STRICT_SYSTEM_SUFFIX));
    }

    #[tokio::test]
    async fn test_blank_completion_over_http_is_retried() {
        use crate::provider::OllamaProvider;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": ""})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "{\"resumo_juridico\": \"Locação\"}"})),
            )
            .mount(&server)
            .await;

        let provider = Arc::new(OllamaProvider::new(server.uri(), "llama3.2:3b"));
        let analyzer = ContractAnalyzer::new(provider, 0.2, 1000);

        let analysis = analyzer.analyze("CONTRATO").await.unwrap();
        assert_eq!(analysis["resumo_juridico"], "Locação");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = ScriptedProvider::new(&[]);
        let analyzer = ContractAnalyzer::new(provider, 0.2, 1000);
        let err = analyzer.analyze("CONTRATO").await.unwrap_err();
        assert!(err.to_string().starts_with("Falha na análise"));
    }

    #[tokio::test]
    async fn test_answer_uses_relevant_chunks() {
        let provider = ScriptedProvider::new(&["  O prazo é de 12 meses.  "]);
        let analyzer = ContractAnalyzer::new(provider.clone(), 0.2, 1000);

        let text = "CLÁUSULA 1 - O prazo de vigência é de 12 meses.\nCLÁUSULA 2 - O pagamento será mensal.";
        let answer = analyzer.answer("Qual o prazo de vigência?", text).await.unwrap();
        assert_eq!(answer, "O prazo é de 12 meses.");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].system, prompts::QA_SYSTEM_PROMPT);
        assert!(requests[0].prompt.starts_with("Pergunta: Qual o prazo de vigência?"));
        assert!(requests[0].prompt.contains("prazo de vigência é de 12 meses"));
        assert!(!requests[0].json_output);
    }
}
