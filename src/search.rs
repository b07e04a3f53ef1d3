//! `docent search` and `docent ask` output.

use anyhow::Result;

use crate::prompt::truncate_chars;
use crate::service::RagService;

const EXCERPT_CHARS: usize = 240;

/// Run a hybrid search and print ranked passages, or JSON with `--json`.
pub async fn run_search(
    service: &RagService,
    query: &str,
    k: Option<usize>,
    json: bool,
) -> Result<()> {
    let results = service.search(query, k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.score, result.source);
        let flat = result.text.replace('\n', " ");
        let excerpt = truncate_chars(flat.trim(), EXCERPT_CHARS);
        let ellipsis = if excerpt.len() < flat.trim().len() { "..." } else { "" };
        println!("    excerpt: \"{}{}\"", excerpt, ellipsis);
        println!("    row: {}", result.index);
        println!();
    }

    Ok(())
}

/// Answer a question and print the answer followed by its sources.
pub async fn run_ask(service: &RagService, query: &str, json: bool) -> Result<()> {
    let response = service.ask(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    println!();
    println!("  provider: {}", response.provider);
    if !response.retrieved.is_empty() {
        println!("  sources:");
        for r in &response.retrieved {
            println!("    [{:.3}] {}", r.score, r.source);
        }
    }

    Ok(())
}
