//! Brute-force cosine similarity search with lexical-match boosting.
//!
//! The search operates entirely through the [`ChunkStore`] trait. The caller
//! embeds the query (see [`EmbeddingGateway`](crate::gateway::EmbeddingGateway))
//! and passes both the vector and the raw query text.
//!
//! # Scoring Algorithm
//!
//! 1. Empty store, empty query text or empty query vector → no results.
//! 2. For every chunk with an embedding: `similarity = cos(query, chunk)`.
//!    Chunks whose embedding length differs from the query's are skipped
//!    and logged.
//! 3. `score = similarity + lexical_boost` when [`is_lexical_match`] holds.
//! 4. Stable sort by score, descending (ties keep store order).
//! 5. Without reranking, truncate to `limit`. With reranking, pass the top
//!    `2 × limit` boosted results to [`rerank`], which adds its own lexical
//!    boost on top of the one from step 3.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, SearchResult};
use crate::rerank::rerank;
use crate::store::ChunkStore;

/// Additive score for chunks that lexically match the query.
pub const DEFAULT_LEXICAL_BOOST: f64 = 0.3;

/// Maximum additive score for short chunks during reranking.
pub const DEFAULT_LENGTH_WEIGHT: f64 = 0.1;

/// Maximum additive score for query-term proximity during reranking.
pub const DEFAULT_PROXIMITY_WEIGHT: f64 = 0.1;

/// Heuristic weights for search and rerank. The defaults are tunables, not
/// derived optima.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub lexical_boost: f64,
    pub length_weight: f64,
    pub proximity_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            lexical_boost: DEFAULT_LEXICAL_BOOST,
            length_weight: DEFAULT_LENGTH_WEIGHT,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
        }
    }
}

/// Lowercased, whitespace-split query tokens longer than two characters.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// True when `text` contains the whole query (case-insensitive), or when
/// more than half of the query's terms (see [`query_terms`]) occur in it.
pub fn is_lexical_match(text: &str, query: &str) -> bool {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return false;
    }
    let text_lower = text.to_lowercase();
    if text_lower.contains(&query_lower) {
        return true;
    }

    let terms = query_terms(&query_lower);
    if terms.is_empty() {
        return false;
    }
    let hits = terms.iter().filter(|t| text_lower.contains(t.as_str())).count();
    hits * 2 > terms.len()
}

/// Rank stored chunks against `query_vec`, boosting lexical matches.
///
/// Returns at most `limit` results, best first.
pub fn search<S: ChunkStore + ?Sized>(
    store: &S,
    query_vec: &[f32],
    query: &str,
    limit: usize,
    use_reranking: bool,
    weights: &ScoringWeights,
) -> Vec<SearchResult> {
    if limit == 0 || query.trim().is_empty() || query_vec.is_empty() || store.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<SearchResult> = Vec::new();
    let mut skipped = 0usize;

    store.scan(&mut |chunk: &Chunk| {
        let Some(embedding) = chunk.embedding.as_deref() else {
            return;
        };
        let Some(similarity) = cosine_similarity(query_vec, embedding) else {
            skipped += 1;
            debug!(
                chunk = chunk.id.as_str(),
                query_dims = query_vec.len(),
                chunk_dims = embedding.len(),
                "skipping chunk with mismatched embedding dimension"
            );
            return;
        };
        let boost = if is_lexical_match(&chunk.text, query) {
            weights.lexical_boost
        } else {
            0.0
        };
        scored.push(SearchResult {
            path: chunk.document_path.clone(),
            title: chunk.title.clone(),
            text: chunk.text.clone(),
            score: similarity as f64 + boost,
        });
    });

    if skipped > 0 {
        warn!(
            skipped,
            query_dims = query_vec.len(),
            "chunks with mismatched embedding dimension were excluded from search; a full re-index is required"
        );
    }

    // `sort_by` is stable: equal scores keep store order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if !use_reranking {
        scored.truncate(limit);
        return scored;
    }

    scored.truncate(limit.saturating_mul(2));
    rerank(query, scored, limit, weights)
}
