//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer `{"question": "..."}` from the document store |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_documents", "message": "no documents in documents. ..." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `invalid_question` | 400 |
//! | `no_documents` | 503 |
//! | `document_error`, `context_too_large` | 500 |
//! | `generation_failed` | 502 |
//! | `generation_timeout` | 504 |
//!
//! Only the code and the error's message are returned. Backend transport
//! failures carry their cause chain in the message (e.g. "connection
//! refused"); other internal detail stays in the server log.
//!
//! If the caller disconnects, the handler future is dropped and the pending
//! backend request with it.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::QueryError;
use crate::models::Answer;
use crate::service::QueryService;

#[derive(Clone)]
struct AppState {
    service: Arc<QueryService>,
}

/// Binds to `bind` and serves until Ctrl-C.
pub async fn run_server(bind: &str, service: Arc<QueryService>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        documents = %service.store().root().display(),
        "listening"
    );
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn router(service: Arc<QueryService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
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

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        let kind = err.kind();
        AppError {
            status: kind.status(),
            code: kind.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
}

/// Non-JSON bodies and bodies without a string `question` are rejected
/// before the query service runs.
async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), "rejected /ask body");
        bad_request(rejection.body_text())
    })?;

    let answer = state.service.run(&request.question).await?;
    Ok(Json(answer))
}
