//! REST API for contract analysis

use crate::analyzer::{AnalyzerError, ContractAnalyzer};
use crate::auth::{bearer_token, unix_now, ApiTokens, AuthError, SessionKeys};
use crate::extract::{ExtractError, TextExtractor};
use crate::provider::{self, ProviderError};
use crate::AnalyzerConfig;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Request, State,
    },
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Hint attached to every error body
pub const ERROR_HINT: &str = "Verifique se o arquivo é válido e tente novamente";

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// API state
pub struct ApiState {
    pub analyzer: ContractAnalyzer,
    pub extractor: TextExtractor,
    pub sessions: SessionKeys,
    pub api_tokens: ApiTokens,
    pub auth_required: bool,
    pub max_file_size: usize,
}

impl ApiState {
    /// Build the state from configuration, creating the configured provider
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, ProviderError> {
        let provider = provider::from_config(&config.llm)?;
        Ok(Self {
            analyzer: ContractAnalyzer::new(provider, config.llm.temperature, config.llm.max_tokens),
            extractor: TextExtractor::new(config.supported_extensions.iter().cloned()),
            sessions: SessionKeys::new(&config.auth.session_secret, config.auth.session_ttl_secs),
            api_tokens: ApiTokens::new(config.auth.admin_token.clone(), config.auth.user_token.clone()),
            auth_required: config.auth.required,
            max_file_size: config.max_file_size,
        })
    }
}

/// Error body returned by every endpoint
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    mensagem: &'a str,
    dica: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "erro",
            mensagem: &self.message,
            dica: ERROR_HINT,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ExtractError> for ApiError {
    fn from(err: ExtractError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        error!(error = %err, "Analysis failed");
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, err.to_string())
    }
}

/// Identity of the caller, `None` for anonymous requests
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<String>);

/// Successful analysis
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub status: &'static str,
    pub analise: Value,
    pub user: Option<String>,
}

/// Question about a contract
#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub pergunta: String,
    pub texto: String,
}

/// Answer to a question
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub status: &'static str,
    pub resposta: String,
}

/// Session token issued by `/login`
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub provider_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_error: Option<String>,
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    let body_limit = state.max_file_size.saturating_add(MULTIPART_OVERHEAD);

    let protected = Router::new()
        .route("/analisar", post(analyze_contract))
        .route("/perguntar", post(ask_question))
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Attach the caller's identity; reject bad tokens, and missing ones when auth is required
async fn resolve_session(
    State(state): State<Arc<ApiState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = match bearer_token(request.headers()) {
        Some(token) => Some(state.sessions.verify(token, unix_now())?.sub),
        None if state.auth_required => return Err(AuthError::Missing.into()),
        None => None,
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Health check endpoint; reports `degraded` when the model backend is unreachable
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let provider = state.analyzer.provider_health().await;
    if !provider.healthy {
        warn!(
            provider = state.analyzer.provider_name(),
            error = provider.error.as_deref().unwrap_or("unknown"),
            "LLM provider health check failed"
        );
    }

    Json(HealthResponse {
        status: if provider.healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.analyzer.provider_name().to_string(),
        provider_healthy: provider.healthy,
        provider_latency_ms: provider.latency_ms,
        provider_error: provider.error,
    })
}

/// Exchange an API token for a session token
async fn login(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, ApiError> {
    let api_token = bearer_token(&headers).ok_or(AuthError::Missing)?;
    let identity = state.api_tokens.identity_for(api_token).inspect_err(|_| {
        warn!("Rejected login with unknown API token");
    })?;

    info!(identity, "Issued session token");
    Ok(Json(LoginResponse {
        token: state.sessions.issue(identity, unix_now()),
    }))
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn read_upload(
    multipart: &mut Multipart,
    extractor: &TextExtractor,
    max_file_size: usize,
) -> Result<Upload, ApiError> {
    let too_large = || {
        ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Arquivo excede o tamanho máximo de {} bytes", max_file_size),
        )
    };

    loop {
        let field = multipart.next_field().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large()
            } else {
                ApiError::bad_request(e.body_text())
            }
        })?;
        let Some(field) = field else {
            return Err(ApiError::bad_request("Nenhum arquivo enviado na requisição"));
        };
        if field.name() != Some("file") {
            continue;
        }

        let uploaded_name = field.file_name().unwrap_or_default().to_string();
        if uploaded_name.is_empty() {
            return Err(ExtractError::EmptyFilename.into());
        }
        let filename = extractor.check(&uploaded_name)?;

        let bytes = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                too_large()
            } else {
                ApiError::bad_request(e.body_text())
            }
        })?;
        if bytes.len() > max_file_size {
            return Err(too_large());
        }

        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
}

/// Extract an uploaded contract's text and analyze it
async fn analyze_contract(
    State(state): State<Arc<ApiState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let upload = read_upload(&mut multipart, &state.extractor, state.max_file_size).await?;

    info!(
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        user = ?user,
        "Received contract upload"
    );

    let extractor = state.extractor.clone();
    let text = tokio::task::spawn_blocking(move || extractor.extract(&upload.filename, &upload.bytes))
        .await
        .map_err(|e| {
            error!(error = %e, "Text extraction task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Falha interna ao extrair o texto")
        })??;

    let analise = state.analyzer.analyze(&text).await?;

    Ok(Json(AnalysisResponse {
        status: "sucesso",
        analise,
        user,
    }))
}

/// Answer a question about a contract's text
async fn ask_question(
    State(state): State<Arc<ApiState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::bad_request(e.body_text()))?;

    if request.pergunta.trim().is_empty() {
        return Err(ApiError::bad_request("Informe uma pergunta"));
    }
    if request.texto.trim().is_empty() {
        return Err(ApiError::bad_request("Carregue um contrato primeiro"));
    }

    info!(user = ?user, chars = request.texto.len(), "Answering contract question");
    let resposta = state.analyzer.answer(&request.pergunta, &request.texto).await?;

    Ok(Json(AnswerResponse {
        status: "sucesso",
        resposta,
    }))
}
