//! Error taxonomy shared by ingestion, index loading, and retrieval.
//!
//! Provider failures inside the generation chain have their own type,
//! [`ProviderError`](crate::generation::ProviderError), because they never
//! reach the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The document extension is not one of txt, md, markdown, pdf, docx.
    #[error("unsupported document format: '{0}'")]
    UnsupportedFormat(String),

    /// Reading, chunking, or embedding failed while building an index.
    /// The previously built index stays valid.
    #[error("ingestion failed: {0}")]
    Ingestion(String),

    /// Corpus, vector table, and similarity index disagree on row count
    /// or dimensionality.
    #[error("index consistency error: {0}")]
    Consistency(String),

    /// A single query could not be served.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// A precondition on configuration or request input was violated.
    #[error("invalid argument: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
