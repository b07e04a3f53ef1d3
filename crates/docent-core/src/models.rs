//! Core data models that flow through chunking, indexing, and retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fixed-size overlapping word window of a source document.
///
/// `id` is globally unique across all ingested documents; `chunk_id` is the
/// 0-based position of the window within its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
}

/// One ranked passage returned by [`Retriever::search`](crate::retriever::Retriever::search).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub text: String,
    pub source: String,
    /// Fused score: `α·vector + (1-α)·lexical_normalized`.
    pub score: f64,
    /// Row of the chunk in the corpus.
    pub index: usize,
}

/// The answer produced by the generation fallback chain.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderOutcome {
    pub answer: String,
    /// Identifier of the provider that produced `answer`.
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}
