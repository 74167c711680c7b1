//! Core data models used throughout the ingestion and retrieval pipeline.
//!
//! Text units come out of the extractor, chunks out of the chunker, and
//! candidate passages out of the retriever. [`DocumentInfo`] is the
//! metadata sidecar persisted next to every document index.

use serde::{Deserialize, Serialize};

/// Positional metadata attached to a [`TextUnit`].
///
/// The shape depends on the source format. Serialized untagged so each
/// variant is a flat JSON object, e.g. `{"page_number": 2}` or `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitMetadata {
    /// 1-based PDF page number.
    Page { page_number: usize },
    /// 1-based DOCX body paragraph number.
    Paragraph { paragraph_number: usize },
    /// Spreadsheet sheet the row came from.
    Sheet { sheet_name: String },
    /// Row position within a cleaned CSV table.
    Row { row_index: usize },
    /// Plain text lines carry no position.
    Empty {},
}

impl UnitMetadata {
    pub fn empty() -> Self {
        UnitMetadata::Empty {}
    }
}

/// One logical piece of an extracted document (page, paragraph, line, or row).
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub text: String,
    pub metadata: UnitMetadata,
}

impl TextUnit {
    pub fn new(text: impl Into<String>, metadata: UnitMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded slice of a text unit, ready for embedding.
///
/// Metadata is copied from the parent unit, never chunk-specific.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: UnitMetadata,
}

/// Metadata sidecar stored as `metadata.json` beside each document index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Original upload filename, before normalization.
    pub filename: String,
    /// User-supplied display name.
    pub document_name: String,
    /// User-supplied description.
    pub document_description: String,
    /// Size of the raw upload in bytes.
    pub file_size: u64,
}

/// A scored passage produced by a similarity search. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidatePassage {
    pub text: String,
    pub score: f32,
}

/// Raw upload as received from a caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content: Vec<u8>,
    pub document_name: String,
    pub document_description: String,
}

/// Result of an upload. Always carries a user-facing message, even on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
}

impl UploadResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
