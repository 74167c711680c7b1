//! CLI integration tests that run the compiled `studio` binary.
//!
//! Providers are disabled (the default without a config file), so these
//! cover every path that does not need a live embedding or language model.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn studio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("studio");
    path
}

fn run_studio(cwd: &Path, args: &[&str]) -> Output {
    Command::new(studio_binary())
        .current_dir(cwd)
        .env_remove("STUDIO_USERNAME")
        .env_remove("STUDIO_PASSWORD")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run studio binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn list_on_empty_store() {
    let tmp = TempDir::new().unwrap();
    let output = run_studio(tmp.path(), &["--store", "store", "list"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("No documents indexed."));
}

#[test]
fn ask_on_empty_store_prints_fallback() {
    let tmp = TempDir::new().unwrap();
    let output = run_studio(tmp.path(), &["--store", "store", "ask", "What is the policy?"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        "No relevant documents found or context is insufficient to answer your question."
    );
}

#[test]
fn upload_blank_text_reports_no_text() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("blank.txt"), "\n\n   \n").unwrap();
    let output = run_studio(tmp.path(), &["--store", "store", "upload", "blank.txt"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        "No text extracted from the file. Check the file content."
    );
}

#[test]
fn upload_unsupported_format_reports_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("notes.md"), "# Notes").unwrap();
    let output = run_studio(tmp.path(), &["--store", "store", "upload", "notes.md"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("Error processing file: Unsupported file format"));
}

#[test]
fn upload_with_embeddings_disabled_reports_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("doc.txt"), "Some real text.").unwrap();
    let output = run_studio(tmp.path(), &["--store", "store", "upload", "doc.txt"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.starts_with("Error processing file:"), "got {}", out);
    assert!(out.contains("disabled"));
    assert!(!tmp.path().join("store").exists() || fs::read_dir(tmp.path().join("store")).unwrap().count() == 0);
}

#[test]
fn ingest_reports_summary() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("empty.txt"), " \n").unwrap();
    fs::write(docs.join("image.png"), [0u8, 1, 2]).unwrap();

    let output = run_studio(tmp.path(), &["--store", "store", "ingest", "docs"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let out = stdout(&output);
    assert!(out.contains("empty.txt: No text extracted"));
    assert!(!out.contains("image.png"));
    assert!(out.contains("files: 1"));
    assert!(out.contains("empty: 1"));
}

#[test]
fn explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_studio(tmp.path(), &["--config", "nope.toml", "list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read config file"));
}

#[test]
fn default_config_file_is_loaded_and_validated() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/studio.toml"),
        "[store]\nroot = \"./from-config\"\n\n[chunking]\nchunk_size = 200\nchunk_overlap = 20\n",
    )
    .unwrap();

    let output = run_studio(tmp.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No documents indexed."));

    fs::write(
        tmp.path().join("config/studio.toml"),
        "[store]\nroot = \"./from-config\"\n\n[chunking]\nchunk_size = 20\nchunk_overlap = 20\n",
    )
    .unwrap();
    let output = run_studio(tmp.path(), &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chunk_overlap"));
}

#[test]
fn credentials_required_when_configured() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(studio_binary())
        .current_dir(tmp.path())
        .env("STUDIO_USERNAME", "admin")
        .env("STUDIO_PASSWORD", "s3cret")
        .args(["--store", "store", "ask", "q"])
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "Please log in to continue.");

    let output = Command::new(studio_binary())
        .current_dir(tmp.path())
        .env("STUDIO_USERNAME", "admin")
        .env("STUDIO_PASSWORD", "s3cret")
        .args(["--store", "store", "--username", "admin", "--password", "s3cret", "ask", "q"])
        .output()
        .unwrap();
    assert!(stdout(&output).starts_with("No relevant documents found"));
}

#[test]
fn list_requires_credentials_when_configured() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(studio_binary())
        .current_dir(tmp.path())
        .env("STUDIO_USERNAME", "admin")
        .env("STUDIO_PASSWORD", "s3cret")
        .args(["--store", "store", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "Please log in to continue.");

    let output = Command::new(studio_binary())
        .current_dir(tmp.path())
        .env("STUDIO_USERNAME", "admin")
        .env("STUDIO_PASSWORD", "s3cret")
        .args(["--store", "store", "--username", "admin", "--password", "s3cret", "list"])
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "No documents indexed.");
}
