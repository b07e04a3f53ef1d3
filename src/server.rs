//! JSON HTTP API over a [`RagService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version and corpus size) |
//! | `POST` | `/ingest` | `{ "path": "..." }` ingest a file or directory on the server |
//! | `POST` | `/search` | `{ "query": "...", "k": 6 }` hybrid search |
//! | `POST` | `/ask` | `{ "query": "..." }` retrieve and answer |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | malformed body, blank query | 400 | `bad_request` |
//! | unsupported file type | 400 | `unsupported_format` |
//! | ingestion failure | 422 | `ingestion_failed` |
//! | search failure | 500 | `retrieval_failed` |
//! | index inconsistency | 500 | `consistency_error` |
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use docent_core::models::RetrievalResult;
use docent_core::Error;

use crate::config::Config;
use crate::service::{AskResponse, IngestReport, RagService};

/// Build the router around a shared service.
pub fn router(service: Arc<RagService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(service)
}

/// Open the service and serve on `[server].bind` until the process exits.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let service = Arc::new(RagService::open(config)?);
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            Error::InvalidConfig(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Ingestion(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ingestion_failed"),
            Error::Retrieval(_) => (StatusCode::INTERNAL_SERVER_ERROR, "retrieval_failed"),
            Error::Consistency(_) => (StatusCode::INTERNAL_SERVER_ERROR, "consistency_error"),
        };
        if status.is_server_error() {
            warn!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    chunks: usize,
}

async fn handle_health(State(service): State<Arc<RagService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        chunks: service.retriever().len(),
    })
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    path: PathBuf,
}

async fn handle_ingest(
    State(service): State<Arc<RagService>>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestReport>, AppError> {
    let Json(req) = body?;
    let report = service.ingest_path(&req.path).await?;
    Ok(Json(report))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievalResult>,
}

async fn handle_search(
    State(service): State<Arc<RagService>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = body?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let results = service.search(&req.query, req.k).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    query: String,
}

async fn handle_ask(
    State(service): State<Arc<RagService>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = body?;
    let response = service.ask(&req.query).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (Error::UnsupportedFormat("xls".into()), 400, "unsupported_format"),
            (Error::InvalidConfig("blank".into()), 400, "bad_request"),
            (Error::Ingestion("io".into()), 422, "ingestion_failed"),
            (Error::Retrieval("embed".into()), 500, "retrieval_failed"),
            (Error::Consistency("rows".into()), 500, "consistency_error"),
        ];
        for (err, status, code) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status.as_u16(), status);
            assert_eq!(app.code, code);
        }
    }
}
