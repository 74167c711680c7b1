//! The two entry points callers use: upload a document, ask a question.
//!
//! [`Assistant`] wires the store, embedder, and language model together once
//! and is shared (behind an `Arc`) by the CLI and the HTTP server. Neither
//! entry point returns an error; every failure becomes a message.

use std::sync::Arc;

use anyhow::Result;

use crate::answer::compose_answer;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::index::IndexBuilder;
use crate::ingest::{Ingestor, UploadOutcome};
use crate::llm::{create_language_model, LanguageModel};
use crate::models::{DocumentInfo, UploadRequest, UploadResponse};
use crate::retrieve::Retriever;
use crate::session::{Session, LOGIN_REQUIRED};
use crate::store::{ContentStore, DocumentKey};

pub struct Assistant {
    store: ContentStore,
    ingestor: Ingestor,
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    context_limit: usize,
}

impl Assistant {
    /// Build from configuration, constructing the configured providers.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let llm = create_language_model(&config.llm)?;
        Ok(Self::new(config, embedder, llm))
    }

    /// Build with explicit providers.
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Self {
        let store = ContentStore::new(&config.store.root);
        let builder = IndexBuilder::new(
            store.clone(),
            embedder.clone(),
            config.embedding.batch_size,
        );
        Self {
            ingestor: Ingestor::new(store.clone(), builder, &config.chunking),
            retriever: Retriever::new(store.clone(), embedder, &config.retrieval),
            store,
            llm,
            context_limit: config.retrieval.context_limit,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Process an upload and report how it ended.
    pub async fn upload_outcome(&self, session: &Session, request: UploadRequest) -> UploadOutcome {
        if !session.is_logged_in() {
            return UploadOutcome::Unauthorized;
        }
        tracing::info!(
            user = session.username().unwrap_or_default(),
            filename = %request.filename,
            bytes = request.content.len(),
            "upload received"
        );
        self.ingestor.process(request).await
    }

    /// Process an upload. Always returns a message.
    pub async fn upload(&self, session: &Session, request: UploadRequest) -> UploadResponse {
        UploadResponse::new(self.upload_outcome(session, request).await.message())
    }

    /// Answer a question from the indexed documents. Always returns text.
    pub async fn ask(&self, session: &Session, question: &str) -> String {
        if !session.is_logged_in() {
            return LOGIN_REQUIRED.to_string();
        }

        let candidates = match self.retriever.retrieve(question).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "retrieval failed");
                return format!("Error retrieving documents: {}", e);
            }
        };
        compose_answer(question, &candidates, self.llm.as_ref(), self.context_limit).await
    }

    /// Every complete document, sorted by key.
    pub fn documents(&self) -> Vec<(DocumentKey, DocumentInfo)> {
        self.store.list_documents()
    }
}
