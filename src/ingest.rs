//! Document intake: raw-copy retention, extraction, and chunking.
//!
//! This module turns files into [`Chunk`]s. Rebuilding and swapping the
//! index happens in [`crate::service`].

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use docent_core::chunk::{chunk_document, WordWindow};
use docent_core::models::Chunk;
use docent_core::{Error, Result};

use crate::extract::{extension_of, is_supported, read_document};

/// One file turned into chunks.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Retained copy under the raw directory.
    pub stored_path: PathBuf,
    pub source: String,
    pub chunks: Vec<Chunk>,
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Ingestion(format!("{} has no usable file name", path.display())))
}

/// Copy `path` into `raw_dir` as `<uuid-hex>_<filename>`.
pub fn retain_copy(path: &Path, raw_dir: &Path) -> Result<PathBuf> {
    let name = file_name_of(path)?;
    std::fs::create_dir_all(raw_dir).map_err(|e| {
        Error::Ingestion(format!("failed to create {}: {}", raw_dir.display(), e))
    })?;
    let dest = raw_dir.join(format!("{}_{}", uuid::Uuid::new_v4().simple(), name));
    std::fs::copy(path, &dest).map_err(|e| {
        Error::Ingestion(format!("failed to copy {}: {}", path.display(), e))
    })?;
    Ok(dest)
}

/// Remove retained copies whose chunks never made it into the index.
pub fn discard_copies(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove retained copy");
        }
    }
}

/// Validate, retain, extract, and chunk one document.
///
/// The extension is checked first, so an unsupported file is rejected
/// before anything is written. If extraction fails the retained copy is
/// removed again.
pub fn prepare_document(
    path: &Path,
    raw_dir: &Path,
    window: &WordWindow,
) -> Result<PreparedDocument> {
    if !is_supported(path) {
        return Err(Error::UnsupportedFormat(extension_of(path)));
    }
    if !path.is_file() {
        return Err(Error::Ingestion(format!("{} is not a file", path.display())));
    }

    let source = file_name_of(path)?;
    let stored_path = retain_copy(path, raw_dir)?;
    let text = match read_document(&stored_path) {
        Ok(text) => text,
        Err(e) => {
            let _ = std::fs::remove_file(&stored_path);
            return Err(e.into());
        }
    };

    let chunks = chunk_document(&source, &text, window);
    debug!(source = %source, chunks = chunks.len(), "document chunked");
    Ok(PreparedDocument {
        stored_path,
        source,
        chunks,
    })
}

/// Supported files under `dir`, in path order, plus the unsupported ones
/// that were passed over.
pub fn discover(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut supported = Vec::new();
    let mut skipped = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry
            .map_err(|e| Error::Ingestion(format!("failed to walk {}: {}", dir.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if is_supported(&path) {
            supported.push(path);
        } else {
            warn!(path = %path.display(), "skipping unsupported file");
            skipped.push(path);
        }
    }
    Ok((supported, skipped))
}
