//! Error taxonomy for the upload and question pipelines.
//!
//! Every variant is caught at a boundary and turned into a message:
//! uploads at [`Assistant::upload`](crate::assistant::Assistant::upload),
//! questions at [`compose_answer`](crate::answer::compose_answer).

use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractError;

/// Failure raised while ingesting or retrieving documents.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Decoding the document failed, or its extension is not supported.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// The document decoded cleanly but produced no text units.
    #[error("no text extracted")]
    EmptyExtraction,

    /// The embedding service rejected the request or could not be reached.
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Writing an index artifact to disk failed.
    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A blocking worker (parsing or disk writes) panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Worker(String),

    /// A persisted artifact exists but cannot be read back.
    #[error("Corrupt index artifact {}: {message}", path.display())]
    CorruptIndex { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn worker(err: tokio::task::JoinError) -> Self {
        PipelineError::Worker(err.to_string())
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::CorruptIndex {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
