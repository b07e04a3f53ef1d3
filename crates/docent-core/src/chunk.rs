//! Overlapping word-window chunker.
//!
//! Splits document text on whitespace and emits windows of `window` words,
//! advancing by `window - overlap` words each step. The final window may be
//! shorter than `window`; a window that reaches the end of the text is always
//! the last one, so text of at most `window` words yields exactly one chunk.
//!
//! Each window becomes a [`Chunk`] with a fresh random UUID (hex, no dashes),
//! the source file name, and its 0-based position within the source.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_WINDOW_WORDS: usize = 300;
pub const DEFAULT_OVERLAP_WORDS: usize = 50;

/// Window geometry for the chunker. Construction enforces a positive stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordWindow {
    window: usize,
    overlap: usize,
}

impl WordWindow {
    /// Build a window of `window` words overlapping by `overlap` words.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] unless `window > overlap`.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window <= overlap {
            return Err(Error::InvalidConfig(format!(
                "chunk window ({}) must be greater than overlap ({})",
                window, overlap
            )));
        }
        Ok(Self { window, overlap })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn stride(&self) -> usize {
        self.window - self.overlap
    }

    /// Word ranges `[start, end)` of each window over `n_words` words.
    pub fn ranges(&self, n_words: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        while start < n_words {
            let end = (start + self.window).min(n_words);
            ranges.push((start, end));
            if end == n_words {
                break;
            }
            start += self.stride();
        }
        ranges
    }

    /// Split `text` into window texts, words re-joined by single spaces.
    pub fn split(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.ranges(words.len())
            .into_iter()
            .map(|(start, end)| words[start..end].join(" "))
            .collect()
    }
}

impl Default for WordWindow {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_WORDS,
            overlap: DEFAULT_OVERLAP_WORDS,
        }
    }
}

/// Chunk a document's text into [`Chunk`] records attributed to `source`.
///
/// Empty or whitespace-only text produces no chunks.
pub fn chunk_document(source: &str, text: &str, window: &WordWindow) -> Vec<Chunk> {
    window
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(i, t)| make_chunk(source, i, t))
        .collect()
}

fn make_chunk(source: &str, position: usize, text: String) -> Chunk {
    Chunk {
        id: Uuid::new_v4().simple().to_string(),
        text,
        source: source.to_string(),
        chunk_id: position,
    }
}
