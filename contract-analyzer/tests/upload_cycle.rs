//! Upload client against a live server backed by a mocked LLM API

use contract_analyzer::api::{create_router, ApiState};
use contract_analyzer::client::{
    HttpTransport, Notifier, SelectedFile, SubmitOutcome, UploadClient, NETWORK_ERROR_ALERT,
};
use contract_analyzer::AnalyzerConfig;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Alerts(Vec<String>);

impl Notifier for Alerts {
    fn alert(&mut self, message: &str) {
        self.0.push(message.to_string());
    }
}

async fn mock_llm(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })))
        .mount(&server)
        .await;
    server
}

/// Start the analysis server on an ephemeral port, returning its `/analisar` URL
async fn start_server(llm: &MockServer) -> String {
    let mut config = AnalyzerConfig::default();
    config.llm.base_url = Some(llm.uri());
    config.llm.api_key = Some("test-key".to_string());

    let state = ApiState::from_config(&config).unwrap();
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/analisar")
}

#[tokio::test]
async fn text_contract_is_analyzed_and_rendered() {
    let llm = mock_llm(
        r#"{"partes": [{"nome": "Locador"}, {"nome": "Locatário"}],
            "valores_multas": [{"descricao": "Aluguel", "valor_monetario": 2500}],
            "datas_vencimento": [{"descricao": "Aluguel", "data_iso": "2025-05-05"}]}"#,
    )
    .await;
    let endpoint = start_server(&llm).await;

    let mut client = UploadClient::new(HttpTransport::new(endpoint), Alerts::default());
    client.on_file_selected([SelectedFile::new(
        "locacao.txt",
        "CONTRATO DE LOCAÇÃO entre Locador e Locatário".as_bytes().to_vec(),
    )]);

    let outcome = client.submit().await;

    let analysis = match outcome {
        SubmitOutcome::Rendered(analysis) => analysis,
        other => panic!("expected a rendered analysis, got {other:?}"),
    };
    assert_eq!(analysis["partes"][1]["nome"], "Locatário");
    assert_eq!(analysis["valores_multas"][0]["valor_monetario"], "R$ 2.500,00");
    assert_eq!(analysis["resumo_juridico"], "");

    let view = client.view();
    assert!(view.result_visible);
    assert!(!view.empty_state_visible);
    assert!(view.result_text.contains("\"Locador\""));
    assert!(view.submit_enabled);
    assert!(!view.busy_visible);
    assert!(client.notifier().0.is_empty());
}

#[tokio::test]
async fn unsupported_extension_is_rejected_by_server() {
    let llm = mock_llm("{}").await;
    let endpoint = start_server(&llm).await;

    let mut client = UploadClient::new(HttpTransport::new(endpoint), Alerts::default());
    client.on_file_selected([SelectedFile::new("planilha.xlsx", b"PK\x03\x04".to_vec())]);

    let outcome = client.submit().await;

    assert_eq!(
        outcome,
        SubmitOutcome::Rejected {
            status: 400,
            message: "Extensão .xlsx não suportada. Use: .pdf, .docx, .txt".to_string(),
        }
    );
    assert_eq!(client.notifier().0, vec!["Extensão .xlsx não suportada. Use: .pdf, .docx, .txt"]);
    assert!(client.view().empty_state_visible);
    assert!(llm.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn unreachable_server_reports_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = UploadClient::new(
        HttpTransport::new(format!("http://{addr}/analisar")),
        Alerts::default(),
    );
    client.on_file_selected([SelectedFile::new("contract.pdf", b"%PDF-1.4".to_vec())]);

    let outcome = client.submit().await;

    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    assert_eq!(client.notifier().0, vec![NETWORK_ERROR_ALERT]);
    assert!(client.view().empty_state_visible);
    assert!(!client.view().busy_visible);
    assert!(client.view().submit_enabled);
}
