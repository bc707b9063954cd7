//! Second-pass scoring over a small candidate pool.
//!
//! ```text
//! combined = base (boosted search score)
//!          + lexical_boost                          if is_lexical_match
//!          + length_weight × (1 − min(1, len / 2000))
//!          + proximity
//! ```
//!
//! `proximity` averages, over every unordered pair of distinct query terms,
//! `proximity_weight × (1 − min(1, distance / (len / 2)))` for pairs where
//! both terms occur (pairs with a missing term contribute 0). `distance` is
//! the gap between the terms' first occurrences, in characters.

use crate::models::SearchResult;
use crate::search::{is_lexical_match, query_terms, ScoringWeights};

/// Chunk length (in characters) at which the length preference reaches zero.
pub const LENGTH_PREFERENCE_SPAN: f64 = 2000.0;

/// Re-score `candidates` for `query` and return the best `limit`.
///
/// Each candidate's `score` is its boosted search score; the lexical boost
/// is evaluated again here and added on top. The output is a
/// deterministic function of the inputs; ties keep candidate order.
pub fn rerank(
    query: &str,
    candidates: Vec<SearchResult>,
    limit: usize,
    weights: &ScoringWeights,
) -> Vec<SearchResult> {
    let terms = distinct_terms(query);

    let mut rescored: Vec<SearchResult> = candidates
        .into_iter()
        .map(|mut c| {
            let lexical = if is_lexical_match(&c.text, query) {
                weights.lexical_boost
            } else {
                0.0
            };
            c.score += lexical
                + length_bonus(&c.text, weights.length_weight)
                + proximity_bonus(&c.text, &terms, weights.proximity_weight);
            c
        })
        .collect();

    rescored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rescored.truncate(limit);
    rescored
}

/// `weight × (1 − min(1, chars / 2000))`: full weight for an empty chunk,
/// nothing at or beyond 2000 characters.
pub fn length_bonus(text: &str, weight: f64) -> f64 {
    let normalized = (text.chars().count() as f64 / LENGTH_PREFERENCE_SPAN).min(1.0);
    weight * (1.0 - normalized)
}

/// Average pairwise proximity of `terms` inside `text`. Zero for fewer than
/// two terms.
pub fn proximity_bonus(text: &str, terms: &[String], weight: f64) -> f64 {
    if terms.len() < 2 {
        return 0.0;
    }

    let text_lower = text.to_lowercase();
    let half_len = text_lower.chars().count() as f64 / 2.0;
    let positions: Vec<Option<usize>> = terms
        .iter()
        .map(|t| first_char_index(&text_lower, t))
        .collect();

    let mut total = 0.0;
    let mut pairs = 0usize;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            pairs += 1;
            if let (Some(a), Some(b)) = (positions[i], positions[j]) {
                let distance = a.abs_diff(b) as f64;
                let spread = if half_len > 0.0 {
                    (distance / half_len).min(1.0)
                } else {
                    1.0
                };
                total += weight * (1.0 - spread);
            }
        }
    }

    total / pairs as f64
}

fn distinct_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for t in query_terms(query) {
        if !terms.contains(&t) {
            terms.push(t);
        }
    }
    terms
}

fn first_char_index(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte_idx| haystack[..byte_idx].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, text: &str, score: f64) -> SearchResult {
        SearchResult {
            path: path.to_string(),
            title: path.to_string(),
            text: text.to_string(),
            score,
        }
    }

    fn terms(q: &str) -> Vec<String> {
        distinct_terms(q)
    }

    #[test]
    fn test_length_bonus_bounds() {
        assert!((length_bonus("", 0.1) - 0.1).abs() < 1e-12);
        assert_eq!(length_bonus(&"x".repeat(2000), 0.1), 0.0);
        assert_eq!(length_bonus(&"x".repeat(5000), 0.1), 0.0);
        assert!((length_bonus(&"x".repeat(1000), 0.1) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_proximity_single_term_is_zero() {
        assert_eq!(proximity_bonus("alpha beta", &terms("alpha"), 0.1), 0.0);
        assert_eq!(proximity_bonus("alpha beta", &[], 0.1), 0.0);
    }

    #[test]
    fn test_proximity_adjacent_terms() {
        // "alpha" at 0, "beta" at 6, text length 40 → half 20 → 0.1 × (1 − 0.3)
        let text = format!("alpha beta{}", " ".repeat(30));
        let bonus = proximity_bonus(&text, &terms("alpha beta"), 0.1);
        assert!((bonus - 0.07).abs() < 1e-9, "bonus was {}", bonus);
    }

    #[test]
    fn test_proximity_averages_over_all_pairs() {
        // three terms → three pairs; only (alpha, beta) present
        let text = "alpha beta";
        let with_missing = proximity_bonus(text, &terms("alpha beta gamma"), 0.1);
        let only_present = proximity_bonus(text, &terms("alpha beta"), 0.1);
        assert!((with_missing - only_present / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_proximity_far_apart_is_zero() {
        let text = format!("alpha{}beta", " ".repeat(100));
        assert_eq!(proximity_bonus(&text, &terms("alpha beta"), 0.1), 0.0);
    }

    #[test]
    fn test_duplicate_terms_collapse() {
        assert_eq!(terms("fox fox brown"), vec!["fox", "brown"]);
    }

    #[test]
    fn test_rerank_prefers_short_lexical_match() {
        let candidates = vec![
            result("/long.md", &"filler text ".repeat(200), 0.80),
            result("/short.md", "notes on the borrow checker", 0.78),
        ];
        let out = rerank("borrow checker", candidates, 2, &ScoringWeights::default());
        assert_eq!(out[0].path, "/short.md");
        assert!(out[0].score > 1.0);
    }

    #[test]
    fn test_rerank_truncates_and_is_deterministic() {
        let candidates: Vec<SearchResult> = (0..6)
            .map(|i| result(&format!("/{}.md", i), "same text here", 0.5))
            .collect();
        let a = rerank("text here", candidates.clone(), 3, &ScoringWeights::default());
        let b = rerank("text here", candidates, 3, &ScoringWeights::default());
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
        let paths: Vec<&str> = a.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/0.md", "/1.md", "/2.md"]);
    }

    #[test]
    fn test_rerank_empty_candidates() {
        assert!(rerank("q", Vec::new(), 5, &ScoringWeights::default()).is_empty());
    }
}
