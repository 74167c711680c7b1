//! Per-document vector index: build, persist, load, and search.
//!
//! An index is a flat list of `(text, metadata, vector)` entries searched by
//! brute-force cosine similarity. It is written as `index.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "model": "all-minilm-l6-v2",
//!   "dims": 384,
//!   "entries": [
//!     { "text": "…", "metadata": {"page_number": 1}, "vector": "AACAPw…" }
//!   ]
//! }
//! ```
//!
//! `vector` holds base64 of the little-endian `f32` bytes.
//!
//! [`IndexBuilder::build`] writes `metadata.json` first and moves
//! `index.json` into place with a rename, so the sentinel only ever appears
//! once the document is complete.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, embed_in_batches, Embedder};
use crate::error::PipelineError;
use crate::models::{CandidatePassage, Chunk, DocumentInfo, UnitMetadata};
use crate::store::{ContentStore, DocumentKey, INDEX_FILE, METADATA_FILE};

const INDEX_VERSION: u32 = 1;

/// One embedded chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub metadata: UnitMetadata,
    #[serde(with = "vector_b64")]
    pub vector: Vec<f32>,
}

/// The persisted index for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub version: u32,
    pub model: String,
    pub dims: usize,
    pub entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Up to `k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<CandidatePassage> {
        let mut scored: Vec<CandidatePassage> = self
            .entries
            .iter()
            .map(|entry| CandidatePassage {
                text: entry.text.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// Load `index.json` from a document directory.
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        let path = dir.join(INDEX_FILE);
        let bytes = std::fs::read(&path).map_err(|e| PipelineError::corrupt(&path, e))?;
        let index: VectorIndex =
            serde_json::from_slice(&bytes).map_err(|e| PipelineError::corrupt(&path, e))?;
        if index.version != INDEX_VERSION {
            return Err(PipelineError::corrupt(
                &path,
                format!("unsupported index version {}", index.version),
            ));
        }
        if let Some(bad) = index.entries.iter().find(|e| e.vector.len() != index.dims) {
            return Err(PipelineError::corrupt(
                &path,
                format!(
                    "entry has {} dims, index declares {}",
                    bad.vector.len(),
                    index.dims
                ),
            ));
        }
        Ok(index)
    }

    /// Write `index.json` into `dir` via a temporary file and rename.
    pub fn save(&self, dir: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| PipelineError::persistence(dir.join(INDEX_FILE), e.into()))?;
        write_atomic(&dir.join(INDEX_FILE), &json)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp: PathBuf = dir.join(format!(".index-{}.tmp", uuid::Uuid::new_v4()));
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::persistence(&tmp, e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        PipelineError::persistence(path, e)
    })
}

/// Embeds chunks and persists a document's index and sidecar.
pub struct IndexBuilder {
    store: ContentStore,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn new(store: ContentStore, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            store,
            embedder,
            batch_size,
        }
    }

    /// Embed `chunks` (one vector each, in order) and write
    /// `{root}/{key}/metadata.json` followed by `{root}/{key}/index.json`.
    ///
    /// Returns the number of entries written.
    pub async fn build(
        &self,
        key: &DocumentKey,
        chunks: Vec<Chunk>,
        info: &DocumentInfo,
    ) -> Result<usize, PipelineError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, self.batch_size)
            .await
            .map_err(|e| PipelineError::Embedding(format!("{:#}", e)))?;

        let dims = vectors
            .first()
            .map(|v| v.len())
            .unwrap_or_else(|| self.embedder.dims());
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(PipelineError::Embedding(format!(
                "inconsistent vector dimensions: {} vs {}",
                bad.len(),
                dims
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                text: chunk.text,
                metadata: chunk.metadata,
                vector,
            })
            .collect();
        let count = entries.len();

        let dir = self.store.document_dir(key);
        let info_path = dir.join(METADATA_FILE);
        let info_json = serde_json::to_vec_pretty(info)
            .map_err(|e| PipelineError::persistence(&info_path, e.into()))?;
        let index = VectorIndex {
            version: INDEX_VERSION,
            model: self.embedder.model_name().to_string(),
            dims,
            entries,
        };

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| PipelineError::persistence(&dir, e))?;
            std::fs::write(&info_path, info_json)
                .map_err(|e| PipelineError::persistence(&info_path, e))?;
            index.save(&dir)
        })
        .await
        .map_err(PipelineError::worker)??;

        tracing::debug!(key = %key, entries = count, dims, "index written");
        Ok(count)
    }
}

mod vector_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::embedding::{blob_to_vec, vec_to_blob};

    pub fn serialize<S: Serializer>(vector: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(vec_to_blob(vector)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(serde::de::Error::custom("vector byte length not a multiple of 4"));
        }
        Ok(blob_to_vec(&bytes))
    }
}
