//! Plain-text extraction for the supported document formats.
//!
//! Dispatch is on the lowercased file extension: `.txt`, `.md`, and
//! `.markdown` are read as UTF-8; `.pdf` goes through `pdf-extract`; `.docx`
//! is read from `word/document.xml` inside the ZIP container.

use std::io::Read;
use std::path::Path;

/// Extensions (without dot) accepted by [`read_document`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "pdf", "docx"];

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub enum ExtractError {
    /// Extension outside [`SUPPORTED_EXTENSIONS`]; empty when the file has none.
    UnsupportedFormat(String),
    Io(std::io::Error),
    Pdf(String),
    Docx(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedFormat(ext) => write!(f, "unsupported file type: .{}", ext),
            ExtractError::Io(e) => write!(f, "failed to read document: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Docx(e) => write!(f, "DOCX extraction failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::Io(e)
    }
}

impl From<ExtractError> for docent_core::Error {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedFormat(ext) => docent_core::Error::UnsupportedFormat(ext),
            other => docent_core::Error::Ingestion(other.to_string()),
        }
    }
}

/// Lowercased extension of `path`, or the empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// Read `path` and return its plain text.
///
/// The extension is checked before the file is opened, so an unsupported
/// path fails with [`ExtractError::UnsupportedFormat`] even if it does not
/// exist.
pub fn read_document(path: &Path) -> Result<String, ExtractError> {
    let ext = extension_of(path);
    match ext.as_str() {
        "txt" | "md" | "markdown" => Ok(std::fs::read_to_string(path)?),
        "pdf" => extract_pdf(&std::fs::read(path)?),
        "docx" => extract_docx(&std::fs::read(path)?),
        _ => Err(ExtractError::UnsupportedFormat(ext)),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    paragraphs_from_document_xml(&doc_xml)
}

/// Concatenate `<w:t>` runs, one line per `<w:p>` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            // <w:p/> is an empty paragraph
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"p" => {
                paragraphs.push(String::new());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs.join("\n"))
}
