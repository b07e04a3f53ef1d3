use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use docent_core::chunk::{DEFAULT_OVERLAP_WORDS, DEFAULT_WINDOW_WORDS};
use docent_core::index::DEFAULT_EMBED_BATCH;
use docent_core::lexical::Bm25Params;
use docent_core::retriever::{RetrievalParams, DEFAULT_CANDIDATE_MULTIPLIER, DEFAULT_HYBRID_ALPHA};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding `index.bin`, `metadata.json`, and `vectors.bin`.
    pub dir: PathBuf,
    /// Where copies of ingested source files are kept.
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_words")]
    pub window_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_words: DEFAULT_WINDOW_WORDS,
            overlap_words: DEFAULT_OVERLAP_WORDS,
        }
    }
}

fn default_window_words() -> usize {
    DEFAULT_WINDOW_WORDS
}
fn default_overlap_words() -> usize {
    DEFAULT_OVERLAP_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_bm25_epsilon")]
    pub bm25_epsilon: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_multiplier: default_candidate_multiplier(),
            default_k: default_k(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            bm25_epsilon: default_bm25_epsilon(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    DEFAULT_HYBRID_ALPHA
}
fn default_candidate_multiplier() -> usize {
    DEFAULT_CANDIDATE_MULTIPLIER
}
fn default_k() -> usize {
    6
}
fn default_bm25_k1() -> f64 {
    1.5
}
fn default_bm25_b() -> f64 {
    0.75
}
fn default_bm25_epsilon() -> f64 {
    0.25
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            hybrid_alpha: self.hybrid_alpha,
            candidate_multiplier: self.candidate_multiplier,
            bm25: Bm25Params {
                k1: self.bm25_k1,
                b: self.bm25_b,
                epsilon: self.bm25_epsilon,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_EMBED_BATCH
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub const GENERATION_PROVIDERS: &[&str] = &["gemini", "ollama", "mock"];

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Providers in attempt order. The mock responder is always appended.
    #[serde(default = "default_generation_providers")]
    pub providers: Vec<String>,
    /// Per-attempt timeout.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Overrides the Gemini REST endpoint when set.
    #[serde(default)]
    pub gemini_url: Option<String>,
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            providers: default_generation_providers(),
            timeout_secs: default_generation_timeout_secs(),
            gemini_model: default_gemini_model(),
            gemini_url: None,
            ollama_url: default_ollama_url(),
            ollama_model: default_ollama_model(),
        }
    }
}

fn default_generation_providers() -> Vec<String> {
    vec!["gemini".to_string(), "ollama".to_string()]
}
fn default_generation_timeout_secs() -> u64 {
    20
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "phi3:mini".to_string()
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All defaults, with the index under `data/index`.
    pub fn minimal() -> Self {
        Self {
            index: IndexConfig {
                dir: PathBuf::from("data/index"),
                raw_dir: default_raw_dir(),
            },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        if self.chunking.window_words == 0 {
            bail!("chunking.window_words must be > 0");
        }
        if self.chunking.overlap_words >= self.chunking.window_words {
            bail!(
                "chunking.overlap_words ({}) must be less than chunking.window_words ({})",
                self.chunking.overlap_words,
                self.chunking.window_words
            );
        }

        // Validate retrieval
        if !(0.0..=1.0).contains(&self.retrieval.hybrid_alpha) {
            bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
        }
        if self.retrieval.candidate_multiplier < 1 {
            bail!("retrieval.candidate_multiplier must be >= 1");
        }
        if self.retrieval.default_k < 1 {
            bail!("retrieval.default_k must be >= 1");
        }

        // Validate embedding
        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if matches!(self.embedding.provider.as_str(), "openai" | "ollama") {
            if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    self.embedding.provider
                );
            }
            if self.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    self.embedding.provider
                );
            }
        }

        // Validate generation
        for name in &self.generation.providers {
            if !GENERATION_PROVIDERS.contains(&name.as_str()) {
                bail!(
                    "Unknown generation provider: '{}'. Must be one of: {}",
                    name,
                    GENERATION_PROVIDERS.join(", ")
                );
            }
        }
        if self.generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
