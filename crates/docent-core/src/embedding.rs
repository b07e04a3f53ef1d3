//! Embedding capability trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that every embedding backend
//! implements, plus pure helpers for normalization, inner products, and
//! little-endian serialization of `f32` vectors.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `docent` app
//! crate.

use anyhow::Result;
use async_trait::async_trait;

/// Substitute norm for zero vectors, so normalization never divides by zero.
/// A zero row stays a zero row and is never dropped.
pub const ZERO_NORM_EPSILON: f32 = 1e-10;

/// Text → fixed-dimension vector capability.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the vector dimensionality, or `0` if unknown until first use.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>> {
    provider
        .embed_batch(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// L2 norm of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` in place to unit L2 norm. Zero vectors are divided by
/// [`ZERO_NORM_EPSILON`] instead, which leaves them zero.
pub fn l2_normalize(v: &mut [f32]) {
    let mut norm = l2_norm(v);
    if norm == 0.0 {
        norm = ZERO_NORM_EPSILON;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use docent_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a vector. Trailing bytes that
/// do not form a full `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
