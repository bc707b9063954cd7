//! `vsearch search` and `vsearch ask`.

use anyhow::Result;

use vaultsearch_core::models::SearchResult;

use crate::config::Config;
use crate::ingest::open_indexed;

const EXCERPT_CHARS: usize = 240;

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    no_rerank: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let engine = open_indexed(config).await?;
    let limit = limit.unwrap_or(config.retrieval.limit);
    let use_reranking = config.retrieval.use_reranking && !no_rerank;
    let results = engine
        .retriever
        .search(engine.store.as_ref(), query, limit, use_reranking)
        .await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    print_results(&results);
    Ok(())
}

pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let engine = open_indexed(config).await?;
    let answer = engine.answer(question).await?;

    if answer.text.is_empty() {
        println!("Nothing to answer.");
        return Ok(());
    }
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, s) in answer.sources.iter().enumerate() {
            println!("  [{}] {} ({})", i + 1, s.title, s.path);
        }
    }
    Ok(())
}

fn print_results(results: &[SearchResult]) {
    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.2}] {} / {}", i + 1, r.score, r.path, r.title);
        println!("    excerpt: \"{}\"", excerpt(&r.text));
        println!();
    }
}

/// Single-line prefix of `text`, at most [`EXCERPT_CHARS`] characters.
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\n  b\tc"), "a b c");
        let long = "word ".repeat(100);
        let e = excerpt(&long);
        assert!(e.ends_with('…'));
        assert!(e.chars().count() <= EXCERPT_CHARS + 1);
    }
}
