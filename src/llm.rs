//! Language-model clients used to compose answers.
//!
//! The [`LanguageModel`] trait takes a fully built prompt and returns the
//! model's reply. Providers:
//!
//! | `llm.provider` | Client | Endpoint |
//! |----------------|--------|----------|
//! | `groq` | [`ChatCompletionsModel`] | `https://api.groq.com/openai/v1/chat/completions` |
//! | `openai` | [`ChatCompletionsModel`] | `https://api.openai.com/v1/chat/completions` |
//! | `ollama` | [`OllamaModel`] | `http://localhost:11434/api/generate` |
//! | `disabled` | [`DisabledModel`] | none |
//!
//! HTTP clients share the embedding retry policy (429/5xx and network
//! errors back off exponentially; other 4xx fail at once).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::config::LlmConfig;
use crate::embedding::send_with_retry;

const GROQ_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Errors surfaced by a language-model call.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider configured, or its credentials are missing.
    #[error("language model unavailable: {0}")]
    Unavailable(String),
    /// The provider could not be reached or returned an error status.
    #[error("{0}")]
    Request(String),
    /// The provider answered with a body we could not read.
    #[error("malformed language model response: {0}")]
    InvalidResponse(String),
}

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` as a single user turn and return the reply text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Always fails with [`LlmError::Unavailable`].
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Unavailable(
            "llm.provider is disabled".to_string(),
        ))
    }
}

/// OpenAI-compatible `POST {url}/chat/completions` client (Groq, OpenAI).
pub struct ChatCompletionsModel {
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsModel {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let key_env = config
            .key_env()
            .ok_or_else(|| anyhow::anyhow!("llm.api_key_env required for '{}'", config.provider))?;
        let api_key = std::env::var(&key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_env))?;
        let url = config.url.clone().unwrap_or_else(|| {
            if config.provider == "openai" {
                OPENAI_URL.to_string()
            } else {
                GROQ_URL.to_string()
            }
        });
        Ok(Self {
            model: config.model.clone(),
            url,
            api_key,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload);
        let body = send_with_retry(request, self.max_retries, "Chat completions")
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        body.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))
    }
}

/// Ollama `POST {url}/api/generate` client with streaming off.
pub struct OllamaModel {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let request = self.client.post(self.endpoint()).json(&payload);
        let body = send_with_retry(request, self.max_retries, "Ollama")
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if body.get("done").and_then(|d| d.as_bool()) == Some(false) {
            return Err(LlmError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }
        body.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("missing response field".into()))
    }
}

fn build_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("studio-qa/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Create the [`LanguageModel`] selected by configuration.
pub fn create_language_model(config: &LlmConfig) -> anyhow::Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "groq" | "openai" => Ok(Arc::new(ChatCompletionsModel::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        other => anyhow::bail!("Unknown llm provider: {}", other),
    }
}
