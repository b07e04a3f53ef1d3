//! Dense vector table and exact inner-product similarity index.
//!
//! The [`VectorTable`] is a row-major `rows × dims` matrix of `f32`, one row
//! per corpus chunk. The [`FlatIpIndex`] answers top-k queries by exhaustive
//! inner product, which equals cosine similarity once rows and queries are
//! L2-normalized.

use crate::embedding::{dot, l2_normalize};
use crate::error::{Error, Result};

/// Row-major matrix of embedding vectors with a single fixed dimensionality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorTable {
    dims: usize,
    data: Vec<f32>,
}

impl VectorTable {
    /// Wrap a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Consistency`] if `data` is not a whole number of `dims`-wide
    /// rows, or if `dims` is zero while `data` is not empty.
    pub fn new(dims: usize, data: Vec<f32>) -> Result<Self> {
        if dims == 0 {
            if !data.is_empty() {
                return Err(Error::Consistency(format!(
                    "{} values supplied for a zero-dimension table",
                    data.len()
                )));
            }
            return Ok(Self::default());
        }
        if data.len() % dims != 0 {
            return Err(Error::Consistency(format!(
                "{} values do not form whole rows of dimension {}",
                data.len(),
                dims
            )));
        }
        Ok(Self { dims, data })
    }

    /// Stack per-chunk vectors into a table.
    ///
    /// # Errors
    ///
    /// [`Error::Consistency`] if the vectors do not all share one
    /// dimensionality, or if any vector is empty.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Ok(Self::default());
        };
        let dims = first.len();
        if dims == 0 {
            return Err(Error::Consistency("embedding vector is empty".to_string()));
        }
        let mut data = Vec::with_capacity(rows.len() * dims);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dims {
                return Err(Error::Consistency(format!(
                    "vector {} has dimension {}, expected {}",
                    i,
                    row.len(),
                    dims
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn rows(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero; an empty table has no rows anyway.
        self.data.chunks_exact(self.dims.max(1))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// L2-normalize every row in place. Zero rows stay zero.
    pub fn normalize_rows(&mut self) {
        if self.dims == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.dims) {
            l2_normalize(row);
        }
    }
}

/// Exhaustive inner-product index over a [`VectorTable`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIpIndex {
    table: VectorTable,
}

impl FlatIpIndex {
    /// Index the given (already normalized) vectors.
    pub fn build(table: VectorTable) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.table.dims()
    }

    pub fn vectors(&self) -> &VectorTable {
        &self.table
    }

    /// The `k` rows with the highest inner product against `query`, as
    /// `(row, score)` best first. Equal scores keep ascending row order.
    ///
    /// # Errors
    ///
    /// [`Error::Retrieval`] if the query dimensionality differs from the
    /// index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims() {
            return Err(Error::Retrieval(format!(
                "query vector has dimension {}, index has {}",
                query.len(),
                self.dims()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .table
            .iter_rows()
            .enumerate()
            .map(|(i, row)| (i, dot(query, row)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
