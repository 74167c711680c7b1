//! Content store: document identity and the on-disk layout.
//!
//! Every ingested document owns one directory directly under the store
//! root, named by its [`DocumentKey`]:
//!
//! ```text
//! {root}/
//! └── report.pdf_9f86d081…/
//!     ├── metadata.json   # DocumentInfo sidecar
//!     └── index.json      # vector index (completeness sentinel)
//! ```
//!
//! A directory counts as a complete document only when `index.json` is
//! present. Keys are content-addressed, so re-uploading the same bytes
//! under the same name is detected as a duplicate.

use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::DocumentInfo;

/// Name of the vector index file; its presence marks a document complete.
pub const INDEX_FILE: &str = "index.json";
/// Name of the metadata sidecar.
pub const METADATA_FILE: &str = "metadata.json";

/// Stable identifier of an uploaded document: `{normalized_filename}_{sha256}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case the filename and replace spaces with underscores.
///
/// Only the final path component is kept, so a key is always a single
/// directory name inside the store root.
pub fn normalize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    base.to_lowercase().replace(' ', "_")
}

/// Derive the [`DocumentKey`] for an upload.
///
/// Pure: the same bytes and name always give the same key.
///
/// # Example
///
/// ```rust
/// use studio_qa::store::identify;
///
/// let key = identify(b"hello", "My Report.TXT");
/// assert!(key.as_str().starts_with("my_report.txt_"));
/// assert_eq!(key, identify(b"hello", "My Report.TXT"));
/// ```
pub fn identify(content: &[u8], filename: &str) -> DocumentKey {
    let digest = hex::encode(Sha256::digest(content));
    DocumentKey(format!("{}_{}", normalize_filename(filename), digest))
}

/// Handle to the store root directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds (or will hold) the artifacts for `key`.
    pub fn document_dir(&self, key: &DocumentKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Whether a complete index for `key` is present. Checks the sentinel only.
    pub fn exists(&self, key: &DocumentKey) -> bool {
        self.document_dir(key).join(INDEX_FILE).is_file()
    }

    /// Every directory under the root that carries an index sentinel,
    /// sorted by name. A missing root yields an empty list.
    pub fn index_dirs(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(root = %self.root.display(), error = %e, "cannot read store root");
                }
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(INDEX_FILE).is_file())
            .collect();
        dirs.sort();
        dirs
    }

    /// Read the metadata sidecar from a document directory.
    pub fn read_info(&self, dir: &Path) -> anyhow::Result<DocumentInfo> {
        let path = dir.join(METADATA_FILE);
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// All complete documents with a readable sidecar, sorted by key.
    pub fn list_documents(&self) -> Vec<(DocumentKey, DocumentInfo)> {
        self.index_dirs()
            .into_iter()
            .filter_map(|dir| {
                let name = dir.file_name()?.to_string_lossy().into_owned();
                match self.read_info(&dir) {
                    Ok(info) => Some((DocumentKey(name), info)),
                    Err(e) => {
                        tracing::warn!(dir = %dir.display(), error = %e, "skipping document with unreadable metadata");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_doc(root: &Path, name: &str, with_index: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        let info = DocumentInfo {
            filename: format!("{}.txt", name),
            document_name: name.to_string(),
            document_description: String::new(),
            file_size: 3,
        };
        fs::write(dir.join(METADATA_FILE), serde_json::to_string(&info).unwrap()).unwrap();
        if with_index {
            fs::write(dir.join(INDEX_FILE), "{}").unwrap();
        }
    }

    #[test]
    fn key_format() {
        let key = identify(b"abc", "Quarterly Report.PDF");
        assert_eq!(
            key.as_str(),
            "quarterly_report.pdf_ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn key_depends_on_content_and_name() {
        assert_ne!(identify(b"a", "x.txt"), identify(b"b", "x.txt"));
        assert_ne!(identify(b"a", "x.txt"), identify(b"a", "y.txt"));
    }

    #[test]
    fn normalize_strips_directories() {
        assert_eq!(normalize_filename("../../etc/My File.txt"), "my_file.txt");
        assert_eq!(normalize_filename("C:\\docs\\A B.csv"), "a_b.csv");
    }

    #[test]
    fn missing_root_is_empty() {
        let store = ContentStore::new("/nonexistent/studio-store");
        assert!(store.index_dirs().is_empty());
        assert!(store.list_documents().is_empty());
    }

    #[test]
    fn exists_checks_sentinel_only() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContentStore::new(tmp.path());
        let key = identify(b"data", "a.txt");
        assert!(!store.exists(&key));

        fs::create_dir_all(store.document_dir(&key)).unwrap();
        assert!(!store.exists(&key));

        fs::write(store.document_dir(&key).join(INDEX_FILE), "{}").unwrap();
        assert!(store.exists(&key));
    }

    #[test]
    fn index_dirs_skip_incomplete_and_sort() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), "b_doc", true);
        write_doc(tmp.path(), "a_doc", true);
        write_doc(tmp.path(), "c_partial", false);
        fs::write(tmp.path().join("stray.txt"), "x").unwrap();

        let store = ContentStore::new(tmp.path());
        let names: Vec<String> = store
            .index_dirs()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_doc", "b_doc"]);
    }

    #[test]
    fn list_documents_skips_bad_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        write_doc(tmp.path(), "good", true);
        write_doc(tmp.path(), "bad", true);
        fs::write(tmp.path().join("bad").join(METADATA_FILE), "not json").unwrap();

        let docs = ContentStore::new(tmp.path()).list_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0.as_str(), "good");
        assert_eq!(docs[0].1.document_name, "good");
    }
}
