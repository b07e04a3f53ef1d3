//! Index construction: chunks → normalized vector table + similarity index.
//!
//! [`build_index`] embeds every chunk, L2-normalizes the vectors, and wraps
//! them in a [`FlatIpIndex`]. The result is an [`IndexSnapshot`], the
//! in-memory form of the persisted artifact triple (similarity index,
//! chunk metadata, raw vector table).

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::models::Chunk;
use crate::vector::{FlatIpIndex, VectorTable};

/// Default number of texts per embedding call.
pub const DEFAULT_EMBED_BATCH: usize = 64;

/// A matched similarity index, corpus, and vector table.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub index: FlatIpIndex,
    pub chunks: Vec<Chunk>,
    pub vectors: VectorTable,
}

impl IndexSnapshot {
    /// Check that all three parts describe the same rows and dimensionality.
    ///
    /// # Errors
    ///
    /// [`Error::Consistency`] on any row-count or dimension disagreement.
    pub fn validate(&self) -> Result<()> {
        let corpus = self.chunks.len();
        let rows = self.vectors.rows();
        let indexed = self.index.len();
        if corpus != rows || corpus != indexed {
            return Err(Error::Consistency(format!(
                "corpus has {} chunks, vector table {} rows, similarity index {} rows",
                corpus, rows, indexed
            )));
        }
        if corpus > 0 && self.vectors.dims() != self.index.dims() {
            return Err(Error::Consistency(format!(
                "vector table dimension {} differs from similarity index dimension {}",
                self.vectors.dims(),
                self.index.dims()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.dims()
    }
}

/// Embed, normalize, and index `chunks`, preserving their order.
///
/// An empty chunk list produces an empty snapshot without calling the
/// embedder.
///
/// # Errors
///
/// - [`Error::Ingestion`] if the embedder fails or returns the wrong number
///   of vectors. No partial index is produced.
/// - [`Error::Consistency`] if vectors disagree on dimensionality, or differ
///   from the dimensionality the provider declares.
pub async fn build_index(
    embedder: &dyn EmbeddingProvider,
    chunks: Vec<Chunk>,
    batch_size: usize,
) -> Result<IndexSnapshot> {
    if chunks.is_empty() {
        return Ok(IndexSnapshot::default());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embedder
            .embed_batch(batch)
            .await
            .map_err(|e| Error::Ingestion(format!("embedding failed: {:#}", e)))?;
        if vectors.len() != batch.len() {
            return Err(Error::Ingestion(format!(
                "embedding model returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }
        embeddings.extend(vectors);
        debug!(embedded = embeddings.len(), total = texts.len(), "embedding progress");
    }

    let mut vectors = VectorTable::from_rows(embeddings)?;
    let declared = embedder.dims();
    if declared != 0 && declared != vectors.dims() {
        return Err(Error::Consistency(format!(
            "model '{}' declares dimension {} but produced {}",
            embedder.model_name(),
            declared,
            vectors.dims()
        )));
    }
    vectors.normalize_rows();

    let snapshot = IndexSnapshot {
        index: FlatIpIndex::build(vectors.clone()),
        chunks,
        vectors,
    };
    snapshot.validate()?;
    Ok(snapshot)
}
