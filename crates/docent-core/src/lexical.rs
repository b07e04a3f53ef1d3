//! In-memory BM25 (Okapi) lexical index.
//!
//! Documents and queries are tokenized by splitting on whitespace, with no
//! case folding or stemming. Term weights use the Okapi IDF
//! `ln((N - n + 0.5) / (n + 0.5))`; terms whose IDF would be negative
//! (present in more than half the corpus) get `epsilon × mean_idf` instead.
//!
//! ```text
//!                        tf · (k1 + 1)
//! score(d, q) = Σ idf(t) ───────────────────────────────
//!              t∈q       tf + k1 · (1 - b + b·|d|/avgdl)
//! ```

use std::collections::HashMap;

/// BM25 tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Floor factor applied to the mean IDF for negative-IDF terms.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Term-frequency index over an ordered set of texts. Row `i` of the index
/// corresponds to row `i` of the corpus it was built from.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    doc_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

impl Bm25Index {
    /// Build an index over `texts`, preserving their order.
    pub fn build<'a, I>(texts: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut doc_freqs = Vec::new();
        let mut doc_lens = Vec::new();
        let mut containing: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for text in texts {
            let tokens = tokenize(text);
            total_len += tokens.len();
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for t in tokens {
                *freqs.entry(t.to_string()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *containing.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let n = doc_freqs.len();
        let avgdl = if n == 0 {
            0.0
        } else {
            total_len as f64 / n as f64
        };

        let mut idf = HashMap::with_capacity(containing.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in containing {
            let value = ((n as f64 - df as f64 + 0.5) / (df as f64 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = params.epsilon * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            params,
            doc_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_freqs.is_empty()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    /// Raw BM25 score of every document for `query`, in index order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        let k1 = self.params.k1;
        let b = self.params.b;
        let avgdl = if self.avgdl > 0.0 { self.avgdl } else { 1.0 };

        self.doc_freqs
            .iter()
            .zip(self.doc_lens.iter())
            .map(|(freqs, &len)| {
                let norm = k1 * (1.0 - b + b * len as f64 / avgdl);
                terms
                    .iter()
                    .map(|t| {
                        let tf = freqs.get(*t).copied().unwrap_or(0) as f64;
                        let idf = self.idf.get(*t).copied().unwrap_or(0.0);
                        idf * (tf * (k1 + 1.0)) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// The `k` highest-scoring documents as `(row, score)`, best first.
    ///
    /// Every document is a candidate, including those scoring zero. Equal
    /// scores are ordered by ascending row.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = self.scores(query).into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}
