#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use docent::config::Config;
use docent_core::embedding::EmbeddingProvider;
use docent_core::generation::{GenerationProvider, ProviderError};

pub const BOW_DIMS: usize = 64;

/// Deterministic hashed bag-of-words embedder. Texts sharing words get
/// positive inner product; disjoint texts are (mostly) orthogonal.
pub struct BagOfWords {
    dims: usize,
    fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl BagOfWords {
    pub fn new() -> Self {
        Self::with_dims(BOW_DIMS)
    }

    pub fn with_dims(dims: usize) -> Self {
        Self {
            dims,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dims as u64) as usize
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let word: String = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect();
            if !word.is_empty() {
                v[self.bucket(&word)] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWords {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding backend unavailable");
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Generation provider with a fixed outcome that records every prompt.
pub struct Scripted {
    pub id: &'static str,
    pub configured: bool,
    pub answer: Option<&'static str>,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    pub fn ok(id: &'static str, answer: &'static str) -> Self {
        Self {
            id,
            configured: true,
            answer: Some(answer),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(id: &'static str) -> Self {
        Self {
            id,
            configured: true,
            answer: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn boxed(self) -> Box<dyn GenerationProvider> {
        Box::new(self)
    }
}

#[async_trait]
impl GenerationProvider for Scripted {
    fn id(&self) -> &str {
        self.id
    }
    fn is_configured(&self) -> bool {
        self.configured
    }
    async fn generate(&self, prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.answer {
            Some(a) => Ok(a.to_string()),
            None => Err(ProviderError::Status {
                code: 503,
                body: "overloaded".to_string(),
            }),
        }
    }
}

/// Defaults with the index and raw copies inside `root`.
pub fn config_in(root: &Path) -> Config {
    let mut cfg = Config::minimal();
    cfg.index.dir = root.join("index");
    cfg.index.raw_dir = root.join("raw");
    cfg
}

/// `n` distinct words `w0 w1 ...`.
pub fn numbered_words(prefix: &str, n: usize) -> String {
    (0..n)
        .map(|i| format!("{}{}", prefix, i))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Single-page PDF whose content stream shows `phrase` in Helvetica.
pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// DOCX container with one `<w:p>` per entry of `paragraphs`.
pub fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}
