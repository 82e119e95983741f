//! HTTP surface built on axum.
//!
//! Handlers only translate JSON to service calls and errors to status codes.
//! The shared [`RetrievalService`] is immutable, so handlers take no locks.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::RetrievalError;
use crate::service::RetrievalService;
use crate::types::Citation;

/// Shared service handle for axum handlers.
pub type SharedService = Arc<RetrievalService>;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub ok: bool,
    pub results: Vec<Citation>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub return_k: Option<usize>,
}

/// Direct question over caller-supplied contract text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskBasicRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub contract_text: String,
    #[serde(default)]
    pub extra_context: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskBasicResponse {
    pub ok: bool,
    pub answer: String,
}

/// Error body: `{"ok": false, "error": <code>, "detail": <message>}`.
pub struct ApiError(RetrievalError);

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            RetrievalError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "invalid_argument"),
            RetrievalError::MissingQuestion => (StatusCode::BAD_REQUEST, "missing_question"),
            RetrievalError::NotLoaded => (StatusCode::SERVICE_UNAVAILABLE, "not_loaded"),
            RetrievalError::EmptyIndex => (StatusCode::SERVICE_UNAVAILABLE, "empty_index"),
            RetrievalError::GeneratorDisabled => {
                (StatusCode::SERVICE_UNAVAILABLE, "generator_disabled")
            }
            RetrievalError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            RetrievalError::Generator(_) => (StatusCode::BAD_GATEWAY, "generator_failed"),
            RetrievalError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        let body = serde_json::json!({
            "ok": false,
            "error": code,
            "detail": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Build the router with `/health`, `/search`, `/ask`, `/llm/ask` and
/// `/llm/ask-basic`.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/ask", post(ask_handler))
        .route("/llm/ask", post(llm_ask_handler))
        .route("/llm/ask-basic", post(llm_ask_basic_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health_handler(State(svc): State<SharedService>) -> impl IntoResponse {
    Json(svc.health())
}

async fn search_handler(
    State(svc): State<SharedService>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let k = req.k.unwrap_or(svc.defaults().search_k);
    let results = svc.search(&req.question, k).await?;
    Ok(Json(SearchResponse { ok: true, results }))
}

async fn ask_handler(
    State(svc): State<SharedService>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (top_k, return_k) = counts(&svc, &req);
    Ok(Json(svc.ask(&req.question, top_k, return_k).await?))
}

async fn llm_ask_handler(
    State(svc): State<SharedService>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (top_k, return_k) = counts(&svc, &req);
    Ok(Json(svc.ask_generative(&req.question, top_k, return_k).await?))
}

async fn llm_ask_basic_handler(
    State(svc): State<SharedService>,
    Json(req): Json<AskBasicRequest>,
) -> Result<Json<AskBasicResponse>, ApiError> {
    let answer = svc
        .ask_basic(&req.question, &req.contract_text, &req.extra_context)
        .await?;
    Ok(Json(AskBasicResponse { ok: true, answer }))
}

fn counts(svc: &RetrievalService, req: &AskRequest) -> (usize, usize) {
    (
        req.top_k.unwrap_or(svc.defaults().top_k),
        req.return_k.unwrap_or(svc.defaults().return_k),
    )
}

/// Serve until Ctrl-C. The service must be fully loaded before this is called.
pub async fn run(service: SharedService, config: &ServerConfig) -> Result<(), std::io::Error> {
    let app = router(service);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
