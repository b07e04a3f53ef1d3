//! Hybrid retriever: dense and lexical candidates fused into one ranking.
//!
//! # Fusion Algorithm
//!
//! For a query and result count `k`, with `n = candidate_multiplier × k`:
//!
//! 1. Embed and L2-normalize the query; take the top `n` rows of the
//!    similarity index by inner product (`vec`).
//! 2. Score every chunk with BM25; take the top `n` by raw score (`lex`).
//! 3. Union both candidate sets by row. A row missing from one set gets `0`
//!    for that signal.
//! 4. Divide `lex` by `max(lex over the union) + ε`.
//! 5. `final = α·vec + (1-α)·lex_norm`.
//! 6. Sort by `final` descending, then by row ascending; keep `k`.
//!
//! A [`Retriever`] is immutable once built. Rebuilding the index produces a
//! new retriever rather than mutating this one.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::embedding::{embed_query, l2_normalize, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::IndexSnapshot;
use crate::lexical::{Bm25Index, Bm25Params};
use crate::models::{Chunk, RetrievalResult};
use crate::vector::{FlatIpIndex, VectorTable};

/// Added to the lexical normalizer so an all-zero candidate set divides safely.
///
/// BM25 scores can be negative on tiny corpora (the idf floor applies to
/// terms present in most documents). If the union's maximum is then `0`,
/// from a dense-only candidate, the normalizer is `ε` and such negative
/// scores become very large negative fused scores. Those rows sink to the
/// bottom of the ranking; positive signals are unaffected.
pub const LEXICAL_NORM_EPSILON: f64 = 1e-9;

pub const DEFAULT_HYBRID_ALPHA: f64 = 0.6;
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Weight of the dense signal: `final = α·vec + (1-α)·lex`.
    pub hybrid_alpha: f64,
    /// Each signal contributes `candidate_multiplier × k` candidates.
    pub candidate_multiplier: usize,
    pub bm25: Bm25Params,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            hybrid_alpha: DEFAULT_HYBRID_ALPHA,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            bm25: Bm25Params::default(),
        }
    }
}

/// One fused candidate with its component scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub index: usize,
    pub vector: f64,
    pub lexical: f64,
    pub lexical_normalized: f64,
    pub score: f64,
}

/// Merge dense and lexical candidates into a ranked list.
///
/// Both inputs are `(row, raw score)`. The output holds every row from the
/// union, best first; equal scores are ordered by ascending row so the
/// ranking is reproducible.
pub fn fuse(dense: &[(usize, f32)], lexical: &[(usize, f64)], alpha: f64) -> Vec<FusedScore> {
    let mut merged: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
    for &(row, score) in dense {
        merged.entry(row).or_insert((0.0, 0.0)).0 = score as f64;
    }
    for &(row, score) in lexical {
        merged.entry(row).or_insert((0.0, 0.0)).1 = score;
    }

    let max_lexical = if merged.is_empty() {
        1.0
    } else {
        merged
            .values()
            .map(|(_, lex)| *lex)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    let normalizer = max_lexical + LEXICAL_NORM_EPSILON;

    let mut fused: Vec<FusedScore> = merged
        .into_iter()
        .map(|(index, (vector, lexical))| {
            let lexical_normalized = lexical / normalizer;
            FusedScore {
                index,
                vector,
                lexical,
                lexical_normalized,
                score: alpha * vector + (1.0 - alpha) * lexical_normalized,
            }
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    fused
}

/// Read-only hybrid search over one index snapshot.
pub struct Retriever {
    index: FlatIpIndex,
    chunks: Vec<Chunk>,
    vectors: VectorTable,
    lexical: Bm25Index,
    embedder: Arc<dyn EmbeddingProvider>,
    params: RetrievalParams,
}

impl Retriever {
    /// Wrap a snapshot, rebuilding the lexical index from the chunk texts.
    ///
    /// # Errors
    ///
    /// [`Error::Consistency`] if the snapshot's parts disagree.
    pub fn new(
        snapshot: IndexSnapshot,
        embedder: Arc<dyn EmbeddingProvider>,
        params: RetrievalParams,
    ) -> Result<Self> {
        snapshot.validate()?;
        let lexical = Bm25Index::build(snapshot.chunks.iter().map(|c| c.text.as_str()), params.bm25);
        if lexical.len() != snapshot.chunks.len() {
            return Err(Error::Consistency(format!(
                "lexical index has {} rows for {} chunks",
                lexical.len(),
                snapshot.chunks.len()
            )));
        }
        Ok(Self {
            index: snapshot.index,
            chunks: snapshot.chunks,
            vectors: snapshot.vectors,
            lexical,
            embedder,
            params,
        })
    }

    /// A retriever over the empty corpus.
    pub fn empty(embedder: Arc<dyn EmbeddingProvider>, params: RetrievalParams) -> Self {
        Self {
            index: FlatIpIndex::default(),
            chunks: Vec::new(),
            vectors: VectorTable::default(),
            lexical: Bm25Index::build(Vec::<&str>::new(), params.bm25),
            embedder,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn vectors(&self) -> &VectorTable {
        &self.vectors
    }

    pub fn lexical(&self) -> &Bm25Index {
        &self.lexical
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Top `n` rows by inner product with the normalized query embedding.
    ///
    /// # Errors
    ///
    /// [`Error::Retrieval`] if the query cannot be embedded or its
    /// dimensionality does not match the index.
    pub async fn dense_search(&self, query: &str, n: usize) -> Result<Vec<(usize, f32)>> {
        let mut qv = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(|e| Error::Retrieval(format!("query embedding failed: {:#}", e)))?;
        l2_normalize(&mut qv);
        self.index.search(&qv, n)
    }

    /// Top `n` rows by raw BM25 score.
    pub fn lexical_search(&self, query: &str, n: usize) -> Vec<(usize, f64)> {
        self.lexical.top_k(query, n)
    }

    /// Fused candidates for `query` with per-signal scores, best first,
    /// truncated to `k`.
    pub async fn explain(&self, query: &str, k: usize) -> Result<Vec<FusedScore>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let n = k.saturating_mul(self.params.candidate_multiplier.max(1));
        let dense = self.dense_search(query, n).await?;
        let lexical = self.lexical_search(query, n);
        debug!(
            dense = dense.len(),
            lexical = lexical.len(),
            "hybrid candidates"
        );
        let mut fused = fuse(&dense, &lexical, self.params.hybrid_alpha);
        fused.truncate(k);
        Ok(fused)
    }

    /// Top-`k` passages for `query` by fused score.
    ///
    /// An empty corpus (or `k == 0`) returns an empty list without
    /// embedding the query.
    ///
    /// # Errors
    ///
    /// [`Error::Retrieval`] if the query embedding fails. Shared state is
    /// never modified.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let fused = self.explain(query, k).await?;
        Ok(fused
            .into_iter()
            .map(|f| {
                let chunk = &self.chunks[f.index];
                RetrievalResult {
                    text: chunk.text.clone(),
                    source: chunk.source.clone(),
                    score: f.score,
                    index: f.index,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const VOCAB: [&str; 4] = ["ownership", "tomato", "harbor", "lamp"];

    /// One dimension per vocabulary word, counting occurrences.
    struct KeywordEmbedder {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keywords"
        }
        fn dims(&self) -> usize {
            VOCAB.len()
        }
        async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("embedding backend unavailable");
            }
            Ok(texts
                .iter()
                .map(|t| {
                    VOCAB
                        .iter()
                        .map(|w| t.split_whitespace().filter(|x| x == w).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    async fn retriever_over(texts: &[&str], embedder: Arc<KeywordEmbedder>) -> Retriever {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: format!("c{}", i),
                text: t.to_string(),
                source: format!("doc{}.txt", i),
                chunk_id: 0,
            })
            .collect();
        let snapshot = build_index(embedder.as_ref(), chunks, 16).await.unwrap();
        Retriever::new(snapshot, embedder, RetrievalParams::default()).unwrap()
    }

    const CORPUS: [&str; 3] = [
        "ownership and borrowing rules",
        "tomato plants in the garden",
        "the harbor lamp burns all night",
    ];

    #[tokio::test]
    async fn test_search_ranks_matching_chunk_first() {
        let r = retriever_over(&CORPUS, KeywordEmbedder::new()).await;
        let hits = r.search("tomato", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].source, "doc1.txt");
        assert_eq!(hits[0].text, CORPUS[1]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_failing_query_embedding_is_retrieval_error() {
        let embedder = KeywordEmbedder::new();
        let r = retriever_over(&CORPUS, embedder.clone()).await;
        embedder.fail.store(true, Ordering::SeqCst);
        let err = r.search("harbor lamp", 3).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(ref m) if m.contains("unavailable")));
    }

    #[tokio::test]
    async fn test_repeated_search_is_identical() {
        let r = retriever_over(&CORPUS, KeywordEmbedder::new()).await;
        let first = r.search("the harbor lamp", 3).await.unwrap();
        for _ in 0..5 {
            assert_eq!(r.search("the harbor lamp", 3).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_empty_corpus_skips_embedder() {
        let embedder = KeywordEmbedder::new();
        let r = Retriever::empty(embedder.clone(), RetrievalParams::default());
        assert!(r.search("tomato", 5).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_k_skips_embedder() {
        let embedder = KeywordEmbedder::new();
        let r = retriever_over(&CORPUS, embedder.clone()).await;
        let before = embedder.calls.load(Ordering::SeqCst);
        assert!(r.search("tomato", 0).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_explain_matches_search_order() {
        let r = retriever_over(&CORPUS, KeywordEmbedder::new()).await;
        let explained = r.explain("ownership", 3).await.unwrap();
        let hits = r.search("ownership", 3).await.unwrap();
        assert_eq!(
            explained.iter().map(|f| f.index).collect::<Vec<_>>(),
            hits.iter().map(|h| h.index).collect::<Vec<_>>()
        );
        assert_eq!(explained[0].index, 0);
        assert!((explained[0].vector - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_empty() {
        assert!(fuse(&[], &[], 0.6).is_empty());
    }

    #[test]
    fn test_dense_only_candidate_score() {
        // Row 0 is only a dense hit; row 1 is the only lexical hit.
        let fused = fuse(&[(0, 0.8)], &[(1, 4.0)], 0.6);
        let row0 = fused.iter().find(|f| f.index == 0).unwrap();
        assert!((row0.score - 0.48).abs() < 1e-6);
        assert_eq!(row0.lexical, 0.0);
    }

    #[test]
    fn test_lexical_normalized_by_max() {
        let fused = fuse(&[], &[(3, 2.0), (5, 4.0)], 0.6);
        assert_eq!(fused[0].index, 5);
        assert!((fused[0].lexical_normalized - 1.0).abs() < 1e-6);
        assert!((fused[0].score - 0.4).abs() < 1e-6);
        assert!((fused[1].lexical_normalized - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_union_keeps_dense_score_for_shared_rows() {
        let fused = fuse(&[(2, 0.5), (7, 0.9)], &[(2, 3.0), (4, 1.5)], 0.5);
        assert_eq!(fused.len(), 3);
        let row2 = fused.iter().find(|f| f.index == 2).unwrap();
        assert!((row2.vector - 0.5).abs() < 1e-6);
        assert!((row2.score - (0.25 + 0.5 * 3.0 / (3.0 + LEXICAL_NORM_EPSILON))).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_lexical_scores_do_not_divide_by_zero() {
        let fused = fuse(&[(0, 0.3)], &[(1, 0.0), (2, 0.0)], 0.6);
        assert!(fused.iter().all(|f| f.score.is_finite()));
        assert_eq!(fused[0].index, 0);
    }

    #[test]
    fn test_negative_lexical_with_dense_only_candidate_sinks() {
        let fused = fuse(&[(0, 0.5)], &[(1, -0.2)], 0.6);
        assert_eq!(fused[0].index, 0);
        assert!((fused[0].score - 0.3).abs() < 1e-9);
        assert_eq!(fused[1].index, 1);
        assert!(fused[1].score < -1e6);
        assert!(fused[1].score.is_finite());
    }

    #[test]
    fn test_ties_break_by_row() {
        let fused = fuse(&[(9, 0.5), (1, 0.5), (4, 0.5)], &[], 1.0);
        let order: Vec<usize> = fused.iter().map(|f| f.index).collect();
        assert_eq!(order, vec![1, 4, 9]);
    }

    #[test]
    fn test_alpha_extremes() {
        let dense = [(0, 0.9), (1, 0.1)];
        let lexical = [(0, 1.0), (1, 5.0)];
        assert_eq!(fuse(&dense, &lexical, 1.0)[0].index, 0);
        assert_eq!(fuse(&dense, &lexical, 0.0)[0].index, 1);
    }
}
