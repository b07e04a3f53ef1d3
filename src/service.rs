//! The long-lived question-answering service.
//!
//! [`RagService`] owns the embedding provider, the generation chain, and a
//! swappable handle to the current [`Retriever`]. Readers clone the `Arc`
//! out of the handle and search against that snapshot; ingestion builds a
//! complete replacement off to the side, persists it, and only then swaps
//! the handle. A failed ingest therefore never disturbs in-flight or later
//! searches.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use docent_core::chunk::WordWindow;
use docent_core::embedding::EmbeddingProvider;
use docent_core::generation::FallbackChain;
use docent_core::index::build_index;
use docent_core::models::{Chunk, RetrievalResult};
use docent_core::retriever::Retriever;
use docent_core::{Error, Result};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::index_store;
use crate::ingest::{discard_copies, discover, prepare_document};
use crate::prompt::build_prompt;
use crate::providers::build_chain;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status: &'static str,
    /// Retained copy of the last ingested file, or the directory walked.
    pub path: String,
    pub files: usize,
    pub chunks: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedSource {
    pub source: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub query: String,
    pub answer: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    pub retrieved: Vec<RetrievedSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub dims: usize,
    pub model: String,
    pub index_dir: String,
    pub sources: Vec<SourceStats>,
}

pub struct RagService {
    config: Config,
    window: WordWindow,
    embedder: Arc<dyn EmbeddingProvider>,
    chain: FallbackChain,
    current: RwLock<Arc<Retriever>>,
    /// Serializes rebuilds so concurrent ingests cannot drop each other's chunks.
    rebuild: tokio::sync::Mutex<()>,
}

impl RagService {
    /// Build the service from configuration, loading any persisted index.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let chain = build_chain(&config.generation);
        let service = Self::with_components(config, embedder, chain)
            .context("Failed to load persisted index")?;
        Ok(service)
    }

    /// Build the service around explicit embedding and generation backends.
    pub fn with_components(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        chain: FallbackChain,
    ) -> Result<Self> {
        let window = WordWindow::new(config.chunking.window_words, config.chunking.overlap_words)?;
        let snapshot = index_store::load(&config.index.dir, embedder.dims())?;
        let retriever = Retriever::new(snapshot, Arc::clone(&embedder), config.retrieval.params())?;
        info!(
            chunks = retriever.len(),
            model = embedder.model_name(),
            providers = ?chain.provider_ids(),
            "service ready"
        );
        Ok(Self {
            config,
            window,
            embedder,
            chain,
            current: RwLock::new(Arc::new(retriever)),
            rebuild: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// The retriever currently serving queries.
    pub fn retriever(&self) -> Arc<Retriever> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    fn swap(&self, next: Retriever) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(next);
    }

    /// Append `new_chunks` to the corpus, rebuild, persist, and swap.
    async fn extend_corpus(&self, new_chunks: Vec<Chunk>) -> Result<usize> {
        let _rebuild = self.rebuild.lock().await;
        let current = self.retriever();
        let mut corpus = current.chunks().to_vec();
        corpus.extend(new_chunks);

        let snapshot = build_index(
            self.embedder.as_ref(),
            corpus,
            self.config.embedding.batch_size,
        )
        .await?;
        index_store::save(&self.config.index.dir, &snapshot)?;

        let next = Retriever::new(
            snapshot,
            Arc::clone(&self.embedder),
            self.config.retrieval.params(),
        )?;
        let total = next.len();
        self.swap(next);
        Ok(total)
    }

    /// Ingest a single document and make it searchable.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] for an unknown extension,
    /// [`Error::Ingestion`] if reading, embedding, or persisting fails. The
    /// serving index is unchanged on error.
    pub async fn ingest(&self, path: &Path) -> Result<IngestReport> {
        let doc = prepare_document(path, &self.config.index.raw_dir, &self.window)?;
        let added = doc.chunks.len();
        let total = match self.extend_corpus(doc.chunks).await {
            Ok(total) => total,
            Err(e) => {
                discard_copies(std::slice::from_ref(&doc.stored_path));
                return Err(e);
            }
        };
        info!(source = %doc.source, chunks = added, total, "document indexed");
        Ok(IngestReport {
            status: "indexed",
            path: doc.stored_path.display().to_string(),
            files: 1,
            chunks: added,
            skipped: Vec::new(),
        })
    }

    /// Ingest every supported file under `dir` with a single rebuild.
    /// Unsupported files are reported in `skipped`.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport> {
        let (files, skipped) = discover(dir)?;
        let mut chunks = Vec::new();
        let mut stored = Vec::with_capacity(files.len());
        for file in &files {
            match prepare_document(file, &self.config.index.raw_dir, &self.window) {
                Ok(doc) => {
                    stored.push(doc.stored_path);
                    chunks.extend(doc.chunks);
                }
                Err(e) => {
                    discard_copies(&stored);
                    return Err(e);
                }
            }
        }
        let added = chunks.len();
        if !files.is_empty() {
            let total = match self.extend_corpus(chunks).await {
                Ok(total) => total,
                Err(e) => {
                    discard_copies(&stored);
                    return Err(e);
                }
            };
            info!(dir = %dir.display(), files = files.len(), chunks = added, total, "directory indexed");
        }
        Ok(IngestReport {
            status: "indexed",
            path: dir.display().to_string(),
            files: files.len(),
            chunks: added,
            skipped: skipped.iter().map(|p| p.display().to_string()).collect(),
        })
    }

    /// Ingest a file or, for a directory, everything under it.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestReport> {
        if path.is_dir() {
            self.ingest_dir(path).await
        } else {
            self.ingest(path).await
        }
    }

    /// Top-`k` passages for `query`; `None` uses `retrieval.default_k`.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        let k = k.unwrap_or(self.config.retrieval.default_k);
        self.retriever().search(query, k).await
    }

    /// Retrieve, assemble a prompt, and generate an answer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for a blank query, [`Error::Retrieval`] if
    /// search fails. Generation itself cannot fail.
    pub async fn ask(&self, query: &str) -> Result<AskResponse> {
        if query.trim().is_empty() {
            return Err(Error::InvalidConfig("query must not be empty".to_string()));
        }
        let hits = self.search(query, None).await?;
        let prompt = build_prompt(query, &hits);
        let outcome = self.chain.generate(&prompt).await;
        Ok(AskResponse {
            query: query.to_string(),
            answer: outcome.answer.trim().to_string(),
            provider: outcome.provider,
            timestamp: outcome.timestamp,
            retrieved: hits
                .into_iter()
                .map(|h| RetrievedSource {
                    source: h.source,
                    score: h.score,
                })
                .collect(),
        })
    }

    pub fn stats(&self) -> IndexStats {
        let retriever = self.retriever();
        let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
        for chunk in retriever.chunks() {
            *per_source.entry(chunk.source.as_str()).or_insert(0) += 1;
        }
        IndexStats {
            chunks: retriever.len(),
            dims: retriever.vectors().dims(),
            model: self.embedder.model_name().to_string(),
            index_dir: self.config.index.dir.display().to_string(),
            sources: per_source
                .into_iter()
                .map(|(source, chunks)| SourceStats {
                    source: source.to_string(),
                    chunks,
                })
                .collect(),
        }
    }
}
