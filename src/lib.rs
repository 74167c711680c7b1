//! # Studio QA
//!
//! A document question-answering assistant. Users upload documents; the
//! system extracts and indexes their text, then answers questions with a
//! language model grounded in the most relevant passages.
//!
//! ## Architecture
//!
//! ```text
//!  upload ─▶ ┌───────┐   ┌─────────┐   ┌───────┐   ┌───────────┐
//!            │ Store │──▶│ Extract │──▶│ Chunk │──▶│ Index     │──▶ {root}/{key}/
//!            │ dedup │   │ 5 fmts  │   │ 500/50│   │ embed+save│     index.json
//!            └───────┘   └─────────┘   └───────┘   └───────────┘     metadata.json
//!
//!  question ─▶ ┌────────────────────┐   ┌──────────────┐
//!              │ Retrieve           │──▶│ Compose      │──▶ answer text
//!              │ every index, top k │   │ prompt + LLM │
//!              └────────────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! studio upload ./handbook.pdf
//! studio ask "What is the refund policy?"
//! studio serve                     # HTTP API on 127.0.0.1:8501
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`store`] | Document identity and on-disk layout |
//! | [`extract`] | PDF/DOCX/TXT/XLSX/CSV text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Per-document vector index build and search |
//! | [`retrieve`] | Multi-index retrieval |
//! | [`answer`] | Grounded prompt and answer composition |
//! | [`llm`] | Language-model clients |
//! | [`ingest`] | Upload processing and bulk ingest |
//! | [`assistant`] | Upload / ask entry points |
//! | [`session`] | Per-request login state |
//! | [`server`] | HTTP API |
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing setup |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |

pub mod answer;
pub mod assistant;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod store;
