//! HTTP API tests driven through the router without binding a socket.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;
use tower::ServiceExt;

use studio_qa::assistant::Assistant;
use studio_qa::config::Config;
use studio_qa::embedding::Embedder;
use studio_qa::llm::{LanguageModel, LlmError};
use studio_qa::server::{router, AppState};
use studio_qa::session::{AccessPolicy, Credentials};

/// Embeds every text as the same unit vector.
struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    fn model_name(&self) -> &str {
        "constant"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        Ok(format!("prompt had {} chars", prompt.len()))
    }
}

fn app(tmp: &TempDir, policy: AccessPolicy) -> axum::Router {
    let config = Config::minimal(tmp.path());
    app_with_config(&config, policy)
}

fn app_with_config(config: &Config, policy: AccessPolicy) -> axum::Router {
    let assistant = Assistant::new(config, Arc::new(ConstantEmbedder), Arc::new(EchoModel));
    router(AppState {
        assistant: Arc::new(assistant),
        policy: Arc::new(policy),
        max_body_bytes: config.server.max_body_bytes,
    })
}

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
}

fn json_post(uri: &str, body: serde_json::Value, auth: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, AccessPolicy::Open)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn upload_then_list_then_ask() {
    let tmp = TempDir::new().unwrap();
    let app = app(&tmp, AccessPolicy::Open);

    let upload = json_post(
        "/documents",
        serde_json::json!({
            "filename": "faq.txt",
            "content_base64": STANDARD.encode("Returns are accepted within 30 days."),
            "document_name": "FAQ",
        }),
        None,
    );
    let response = app.clone().oneshot(upload).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "File processed successfully.");

    let response = app
        .clone()
        .oneshot(Request::get("/documents").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = read_json(response).await;
    let docs = json["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["document_name"], "FAQ");
    assert_eq!(docs[0]["document_description"], "");
    assert!(docs[0]["key"].as_str().unwrap().starts_with("faq.txt_"));

    let response = app
        .oneshot(json_post(
            "/ask",
            serde_json::json!({"question": "What is the return window?"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let answer = read_json(response).await["answer"].as_str().unwrap().to_string();
    assert!(answer.starts_with("prompt had "));
}

#[tokio::test]
async fn ask_on_empty_store_returns_fallback() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, AccessPolicy::Open)
        .oneshot(json_post("/ask", serde_json::json!({"question": "Anything?"}), None))
        .await
        .unwrap();
    assert_eq!(
        read_json(response).await["answer"],
        "No relevant documents found or context is insufficient to answer your question."
    );
}

#[tokio::test]
async fn credentials_are_enforced_when_configured() {
    let tmp = TempDir::new().unwrap();
    let app = app(
        &tmp,
        AccessPolicy::Password(Credentials::new("admin", "s3cret")),
    );

    let response = app
        .clone()
        .oneshot(json_post("/ask", serde_json::json!({"question": "q"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(response).await["error"]["code"], "unauthorized");

    let response = app
        .clone()
        .oneshot(json_post(
            "/ask",
            serde_json::json!({"question": "q"}),
            Some(basic("admin", "wrong")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(json_post(
            "/ask",
            serde_json::json!({"question": "q"}),
            Some(basic("admin", "s3cret")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_base64_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, AccessPolicy::Open)
        .oneshot(json_post(
            "/documents",
            serde_json::json!({"filename": "a.txt", "content_base64": "***"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"]["code"], "bad_request");
}

#[tokio::test]
async fn empty_question_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let response = app(&tmp, AccessPolicy::Open)
        .oneshot(json_post("/ask", serde_json::json!({"question": "  "}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_larger_than_two_megabytes_is_processed() {
    let tmp = TempDir::new().unwrap();
    let line = "Warranty claims are handled by the regional service desk.\n";
    let text = line.repeat(2_500_000 / line.len() + 1);
    assert!(STANDARD.encode(&text).len() > 3 * 1024 * 1024);

    let response = app(&tmp, AccessPolicy::Open)
        .oneshot(json_post(
            "/documents",
            serde_json::json!({
                "filename": "manual.txt",
                "content_base64": STANDARD.encode(&text),
            }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["message"], "File processed successfully.");
}

#[tokio::test]
async fn oversized_body_gets_json_error() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal(tmp.path());
    config.server.max_body_bytes = 1024;

    let response = app_with_config(&config, AccessPolicy::Open)
        .oneshot(json_post(
            "/documents",
            serde_json::json!({
                "filename": "big.txt",
                "content_base64": STANDARD.encode("x".repeat(4096)),
            }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = read_json(response).await;
    assert_eq!(json["error"]["code"], "payload_too_large");
    assert!(json["error"]["message"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn malformed_json_gets_json_error() {
    let tmp = TempDir::new().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from("{\"question\": "))
        .unwrap();
    let response = app(&tmp, AccessPolicy::Open).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"]["code"], "bad_request");
}
