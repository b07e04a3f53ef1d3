//! # Docent
//!
//! Ask questions about your own documents.
//!
//! Docent ingests plain text, Markdown, PDF, and DOCX files, splits them
//! into overlapping word windows, and indexes each window twice: as an
//! L2-normalized embedding in an exact inner-product index, and as a BM25
//! document. Queries are answered by fusing both rankings and handing the
//! top passages to a chain of generation providers that always ends in a
//! deterministic mock, so `ask` never fails for lack of a model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────────┐
//! │  extract   │──▶│ chunk+embed  │──▶│ index.bin          │
//! │ txt/md/pdf │   │ (docent-core)│   │ metadata.json      │
//! │ docx       │   └──────────────┘   │ vectors.bin        │
//! └────────────┘                      └─────────┬──────────┘
//!                                               ▼
//!                        ┌───────────── RagService (swappable retriever)
//!                        ▼                      ▼
//!                  ┌──────────┐           ┌──────────┐
//!                  │   CLI    │           │   HTTP   │
//!                  │ (docent) │           │  (axum)  │
//!                  └──────────┘           └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`extract`] | Per-format text extraction |
//! | [`embedding`] | Concrete embedding backends |
//! | [`providers`] | Gemini and Ollama generation, chain assembly |
//! | [`index_store`] | Persisted index artifacts |
//! | [`ingest`] | Raw-copy retention, extraction, chunking |
//! | [`prompt`] | Prompt assembly |
//! | [`service`] | Ingest / search / ask over a swappable retriever |
//! | [`server`] | HTTP API |
//!
//! Chunking, BM25, the flat index, fusion, and the fallback chain live in
//! the `docent-core` crate.

pub mod config;
pub mod embedding;
pub mod extract;
pub mod index_store;
pub mod ingest;
pub mod prompt;
pub mod providers;
pub mod search;
pub mod server;
pub mod service;
pub mod stats;

pub use docent_core::{Error, Result};
