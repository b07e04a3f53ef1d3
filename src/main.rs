//! # Docent CLI (`docent`)
//!
//! Ingest documents, search them, and ask questions against them.
//!
//! ## Usage
//!
//! ```bash
//! docent --config ./config/docent.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docent ingest <path>` | Index a file, or every supported file under a directory |
//! | `docent search "<query>"` | Hybrid BM25 + vector search |
//! | `docent ask "<question>"` | Retrieve context and generate an answer |
//! | `docent stats` | Corpus size and per-source breakdown |
//! | `docent serve` | Start the HTTP API |
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docent::config;
use docent::search::{run_ask, run_search};
use docent::server::run_server;
use docent::service::RagService;
use docent::stats::run_stats;

/// Docent: ask questions about your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docent.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docent",
    about = "Docent: hybrid BM25 + vector retrieval over your documents, with answers from a provider fallback chain",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// If the file does not exist, built-in defaults are used with the index
    /// under `./data/index`.
    #[arg(long, global = true, default_value = "./config/docent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document or a directory of documents.
    ///
    /// Supported formats: .txt, .md, .markdown, .pdf, .docx. A directory is
    /// walked recursively and indexed with a single rebuild; unsupported
    /// files are skipped.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,
    },

    /// Search indexed passages.
    Search {
        /// The search query string.
        query: String,

        /// Number of results (defaults to `retrieval.default_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Ask a question. Always answers: if no generation provider is
    /// reachable, a deterministic mock answer is returned.
    Ask {
        /// The question.
        query: String,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "config file not found, using defaults");
        config::Config::minimal()
    };

    match cli.command {
        Commands::Serve => {
            run_server(cfg).await?;
        }
        Commands::Ingest { path } => {
            let service = RagService::open(cfg)?;
            let report = service.ingest_path(&path).await?;
            println!(
                "Indexed {} chunk(s) from {} file(s).",
                report.chunks, report.files
            );
            for skipped in &report.skipped {
                println!("  skipped (unsupported): {}", skipped);
            }
        }
        Commands::Search { query, k, json } => {
            let service = RagService::open(cfg)?;
            run_search(&service, &query, k, json).await?;
        }
        Commands::Ask { query, json } => {
            let service = RagService::open(cfg)?;
            run_ask(&service, &query, json).await?;
        }
        Commands::Stats => {
            let service = RagService::open(cfg)?;
            run_stats(&service);
        }
    }

    Ok(())
}
