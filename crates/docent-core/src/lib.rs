//! # Docent Core
//!
//! Runtime-agnostic retrieval logic for Docent: data models, the word-window
//! chunker, lexical (BM25) and dense (inner-product) indexes, the hybrid
//! retriever that fuses both signals, and the generation fallback chain.
//!
//! This crate performs no filesystem or network I/O. Embedding models and
//! generation backends are reached through the [`embedding::EmbeddingProvider`]
//! and [`generation::GenerationProvider`] traits; concrete implementations
//! live in the `docent` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod lexical;
pub mod models;
pub mod retriever;
pub mod vector;

pub use error::{Error, Result};
