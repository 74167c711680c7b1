//! Upload processing and bulk directory ingest.
//!
//! A single upload flows through:
//!
//! ```text
//! identify → exists? → format → extract → chunk → embed + persist
//! ```
//!
//! and always ends in an [`UploadOutcome`] whose [`message`](UploadOutcome::message)
//! is shown to the user. Duplicates are detected before any parsing work.
//!
//! `studio ingest <dir>` walks a directory tree and pushes every matching
//! file through the same path.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::assistant::Assistant;
use crate::chunk::chunk_units;
use crate::config::ChunkingConfig;
use crate::error::PipelineError;
use crate::extract::{extract_units, DocumentFormat};
use crate::index::IndexBuilder;
use crate::models::{DocumentInfo, UploadRequest};
use crate::session::{Session, LOGIN_REQUIRED};
use crate::store::{identify, ContentStore, DocumentKey};

pub const MSG_PROCESSED: &str = "File processed successfully.";
pub const MSG_DUPLICATE: &str = "File already processed.";
pub const MSG_EMPTY: &str = "No text extracted from the file. Check the file content.";

/// How an upload ended.
#[derive(Debug)]
pub enum UploadOutcome {
    Processed { key: DocumentKey, chunks: usize },
    Duplicate { key: DocumentKey },
    Empty,
    Failed(PipelineError),
    Unauthorized,
}

impl UploadOutcome {
    /// The user-facing message for this outcome.
    pub fn message(&self) -> String {
        match self {
            UploadOutcome::Processed { .. } => MSG_PROCESSED.to_string(),
            UploadOutcome::Duplicate { .. } => MSG_DUPLICATE.to_string(),
            UploadOutcome::Empty => MSG_EMPTY.to_string(),
            UploadOutcome::Failed(e) => format!("Error processing file: {}", e),
            UploadOutcome::Unauthorized => LOGIN_REQUIRED.to_string(),
        }
    }
}

/// Turns raw uploads into persisted document indices.
pub struct Ingestor {
    store: ContentStore,
    builder: IndexBuilder,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Ingestor {
    pub fn new(store: ContentStore, builder: IndexBuilder, chunking: &ChunkingConfig) -> Self {
        Self {
            store,
            builder,
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
        }
    }

    pub async fn process(&self, request: UploadRequest) -> UploadOutcome {
        let key = identify(&request.content, &request.filename);

        if self.store.exists(&key) {
            tracing::info!(key = %key, "duplicate upload");
            return UploadOutcome::Duplicate { key };
        }

        match self.build(&key, request).await {
            Ok(chunks) => {
                tracing::info!(key = %key, chunks, "document indexed");
                UploadOutcome::Processed { key, chunks }
            }
            Err(PipelineError::EmptyExtraction) => {
                tracing::warn!(key = %key, "no text extracted");
                UploadOutcome::Empty
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "upload failed");
                UploadOutcome::Failed(e)
            }
        }
    }

    async fn build(&self, key: &DocumentKey, request: UploadRequest) -> Result<usize, PipelineError> {
        let format = DocumentFormat::from_filename(&request.filename)?;

        // Parsing and chunking are CPU bound; keep them off the async workers.
        let (chunk_size, chunk_overlap) = (self.chunk_size, self.chunk_overlap);
        let (request, chunks) = tokio::task::spawn_blocking(move || {
            let units = extract_units(&request.content, format)?;
            let chunks = chunk_units(&units, chunk_size, chunk_overlap);
            Ok::<_, PipelineError>((request, chunks))
        })
        .await
        .map_err(PipelineError::worker)??;
        if chunks.is_empty() {
            return Err(PipelineError::EmptyExtraction);
        }

        let info = DocumentInfo {
            file_size: request.content.len() as u64,
            filename: request.filename,
            document_name: request.document_name,
            document_description: request.document_description,
        };
        self.builder.build(key, chunks, &info).await
    }
}

// ============ Bulk ingest ============

/// Options for `studio ingest`.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub root: PathBuf,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl IngestOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

/// `**/*.{ext}` for every supported format.
pub fn default_include_globs() -> Vec<String> {
    DocumentFormat::ALL
        .iter()
        .map(|f| format!("**/*.{}", f.extension()))
        .collect()
}

/// Counts reported at the end of a bulk ingest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub failed: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Processed { .. } => self.processed += 1,
            UploadOutcome::Duplicate { .. } => self.duplicates += 1,
            UploadOutcome::Empty => self.empty += 1,
            UploadOutcome::Failed(_) | UploadOutcome::Unauthorized => self.failed += 1,
        }
    }
}

/// Files under `options.root` matching the include globs and none of the
/// excludes, as root-relative paths, sorted.
pub fn scan_dir(options: &IngestOptions) -> Result<Vec<PathBuf>> {
    let root = &options.root;
    if !root.is_dir() {
        bail!("Ingest root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&options.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(options.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel_str = relative.to_string_lossy();
        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Upload every matching file under `options.root`, printing one line per
/// file and a closing summary.
pub async fn run_ingest_dir(
    assistant: &Assistant,
    session: &Session,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    if !session.is_logged_in() {
        bail!(LOGIN_REQUIRED);
    }

    let files = scan_dir(options)?;
    let mut summary = IngestSummary::default();

    for relative in &files {
        let request = read_upload(&options.root.join(relative))?;
        let outcome = assistant.upload_outcome(session, request).await;
        println!("  {}: {}", relative.display(), outcome.message());
        summary.record(&outcome);
    }

    println!("ingest {}", options.root.display());
    println!("  files: {}", files.len());
    println!("  processed: {}", summary.processed);
    println!("  duplicates: {}", summary.duplicates);
    println!("  empty: {}", summary.empty);
    println!("  failed: {}", summary.failed);
    println!("ok");

    Ok(summary)
}

/// Read a file from disk into an [`UploadRequest`] named after its file name.
pub fn read_upload(path: &Path) -> Result<UploadRequest> {
    let content = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadRequest {
        document_name: filename.clone(),
        document_description: String::new(),
        filename,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::embedding::Embedder;

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        fn model_name(&self) -> &str {
            "flat"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    fn ingestor(root: &Path) -> Ingestor {
        let store = ContentStore::new(root);
        let builder = IndexBuilder::new(store.clone(), Arc::new(FlatEmbedder), 64);
        Ingestor::new(store, builder, &ChunkingConfig::default())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parsing_yields_to_other_tasks() {
        let tmp = tempfile::tempdir().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });

        let text = "Shipping takes three to five business days.\n".repeat(50_000);
        let outcome = ingestor(tmp.path())
            .process(UploadRequest {
                filename: "shipping.txt".into(),
                content: text.into_bytes(),
                document_name: "Shipping".into(),
                document_description: String::new(),
            })
            .await;

        assert!(matches!(outcome, UploadOutcome::Processed { .. }));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn default_globs_cover_supported_formats() {
        let globs = default_include_globs();
        assert_eq!(globs.len(), 5);
        assert!(globs.contains(&"**/*.xlsx".to_string()));
    }

    #[test]
    fn scan_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("sub/a.csv"), "h\n1").unwrap();
        fs::write(root.join("image.png"), [0u8; 4]).unwrap();
        fs::write(root.join("node_modules/pkg/readme.txt"), "x").unwrap();

        let files = scan_dir(&IngestOptions::new(root)).unwrap();
        assert_eq!(files, vec![PathBuf::from("b.txt"), PathBuf::from("sub/a.csv")]);
    }

    #[test]
    fn scan_honors_custom_excludes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("keep.txt"), "k").unwrap();
        fs::write(tmp.path().join("draft.txt"), "d").unwrap();

        let mut options = IngestOptions::new(tmp.path());
        options.exclude_globs = vec!["draft.*".to_string()];
        let files = scan_dir(&options).unwrap();
        assert_eq!(files, vec![PathBuf::from("keep.txt")]);
    }

    #[test]
    fn scan_rejects_missing_root() {
        assert!(scan_dir(&IngestOptions::new("/nonexistent/ingest-root")).is_err());
    }

    #[test]
    fn outcome_messages() {
        assert_eq!(UploadOutcome::Empty.message(), MSG_EMPTY);
        assert_eq!(UploadOutcome::Unauthorized.message(), LOGIN_REQUIRED);
        let failed = UploadOutcome::Failed(PipelineError::Embedding("down".into()));
        assert_eq!(
            failed.message(),
            "Error processing file: Embedding service error: down"
        );
    }
}
