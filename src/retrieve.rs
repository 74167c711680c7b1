//! Question-time retrieval across every document index in the store.
//!
//! The question is embedded once, then each complete index is loaded and
//! searched for its `per_index_limit` best passages. Results are
//! concatenated in directory order, so with the default settings the
//! earliest documents dominate the prompt. Setting
//! `retrieval.global_rerank` sorts the merged list by score instead.
//!
//! Indices that fail to load, or whose dimensions do not match the query
//! vector, are skipped with a warning.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, Embedder};
use crate::error::PipelineError;
use crate::index::VectorIndex;
use crate::models::CandidatePassage;
use crate::store::ContentStore;

pub struct Retriever {
    store: ContentStore,
    embedder: Arc<dyn Embedder>,
    per_index_limit: usize,
    global_rerank: bool,
}

impl Retriever {
    pub fn new(store: ContentStore, embedder: Arc<dyn Embedder>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            embedder,
            per_index_limit: config.per_index_limit,
            global_rerank: config.global_rerank,
        }
    }

    /// Candidate passages for `question` from all indexed documents.
    ///
    /// An empty store returns an empty list without calling the embedder.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<CandidatePassage>, PipelineError> {
        let dirs = self.store.index_dirs();
        if dirs.is_empty() {
            return Ok(Vec::new());
        }

        let query = embed_query(self.embedder.as_ref(), question)
            .await
            .map_err(|e| PipelineError::Embedding(format!("{:#}", e)))?;

        let mut candidates = Vec::new();
        for dir in &dirs {
            let index = match VectorIndex::load(dir) {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable index");
                    continue;
                }
            };
            if index.dims != query.len() {
                tracing::warn!(
                    dir = %dir.display(),
                    index_dims = index.dims,
                    query_dims = query.len(),
                    "skipping index built with a different embedding model"
                );
                continue;
            }
            candidates.extend(index.search(&query, self.per_index_limit));
        }

        if self.global_rerank {
            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        tracing::debug!(
            indices = dirs.len(),
            candidates = candidates.len(),
            "retrieval complete"
        );
        Ok(candidates)
    }
}
