//! Prompt assembly for the ask pipeline.

use docent_core::models::RetrievalResult;

/// Per-passage character budget inside the context block.
pub const MAX_PASSAGE_CHARS: usize = 1000;

pub const NO_CONTEXT: &str = "No relevant context found.";

const SYSTEM_INSTRUCTIONS: &str = "\
You are a helpful assistant that answers questions in a conversational style.
- Use CONTEXT if relevant to the query.
- If CONTEXT is incomplete, answer confidently using your own knowledge.
- Present the answer in clear paragraphs or bullet points, friendly and informative.
- Do NOT include citations or sources.
- Avoid saying \"I don't know\" unless literally impossible to answer.";

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// The context block: each hit truncated to [`MAX_PASSAGE_CHARS`], joined
/// by newlines, or [`NO_CONTEXT`] when there are no hits.
pub fn build_context(hits: &[RetrievalResult]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }
    hits.iter()
        .map(|h| truncate_chars(&h.text, MAX_PASSAGE_CHARS))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(query: &str, hits: &[RetrievalResult]) -> String {
    format!(
        "SYSTEM:\n{}\n\nUSER QUERY:\n{}\n\nCONTEXT:\n{}",
        SYSTEM_INSTRUCTIONS,
        query,
        build_context(hits)
    )
}
