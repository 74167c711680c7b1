//! JSON HTTP API over the [`Assistant`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/documents` | List indexed documents |
//! | `POST` | `/documents` | Upload a document (base64 content) |
//! | `POST` | `/ask` | Answer a question from the indexed documents |
//!
//! # Authentication
//!
//! When credentials are configured, `/documents` and `/ask` require HTTP
//! Basic auth. Each request builds its own [`Session`]; nothing is
//! remembered between requests.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content_base64 is not valid base64" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `payload_too_large` (413). Request bodies are capped at
//! `[server].max_body_bytes`.
//!
//! Upload and ask failures inside the pipeline are not HTTP errors: they
//! come back as `200` with the explanatory `message` or `answer` text.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::Assistant;
use crate::config::Config;
use crate::models::{UploadRequest, UploadResponse};
use crate::session::{AccessPolicy, Session};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub policy: Arc<AccessPolicy>,
    pub max_body_bytes: usize,
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("studio server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Exposed so tests can drive it without a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", get(handle_list_documents).post(handle_upload))
        .route("/ask", post(handle_ask))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
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

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "bad_request"
        };
        AppError {
            status,
            code,
            message: rejection.body_text(),
        }
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "valid credentials required".to_string(),
    }
}

/// Resolve the caller's session from an optional `Authorization: Basic` header.
fn session_for(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    let decoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|b64| STANDARD.decode(b64.trim()).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let presented = decoded.as_deref().and_then(|s| s.split_once(':'));

    match state.policy.authenticate(presented) {
        Session::LoggedOut => Err(unauthorized()),
        session => Ok(session),
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

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentEntry {
    key: String,
    filename: String,
    document_name: String,
    document_description: String,
    file_size: u64,
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<DocumentEntry>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DocumentListResponse>, AppError> {
    session_for(&state, &headers)?;
    let documents = state
        .assistant
        .documents()
        .into_iter()
        .map(|(key, info)| DocumentEntry {
            key: key.to_string(),
            filename: info.filename,
            document_name: info.document_name,
            document_description: info.document_description,
            file_size: info.file_size,
        })
        .collect();
    Ok(Json(DocumentListResponse { documents }))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UploadBody {
    filename: String,
    content_base64: String,
    #[serde(default)]
    document_name: Option<String>,
    #[serde(default)]
    document_description: Option<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UploadBody>, JsonRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let session = session_for(&state, &headers)?;
    let Json(body) = body?;
    if body.filename.trim().is_empty() {
        return Err(bad_request("filename must not be empty"));
    }
    let content = STANDARD
        .decode(body.content_base64.as_bytes())
        .map_err(|e| bad_request(format!("content_base64 is not valid base64: {}", e)))?;

    let request = UploadRequest {
        document_name: body
            .document_name
            .unwrap_or_else(|| body.filename.clone()),
        document_description: body.document_description.unwrap_or_default(),
        filename: body.filename,
        content,
    };
    Ok(Json(state.assistant.upload(&session, request).await))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskBody {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AskBody>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let session = session_for(&state, &headers)?;
    let Json(body) = body?;
    if body.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    let answer = state.assistant.ask(&session, &body.question).await;
    Ok(Json(AskResponse { answer }))
}
