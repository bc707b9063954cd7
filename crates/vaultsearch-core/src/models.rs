//! Core data models shared by the indexing and retrieval paths.
//!
//! A [`Chunk`] is the unit the [`ChunkStore`](crate::store::ChunkStore)
//! owns; a [`SearchResult`] is the derived, never-persisted value the
//! search and rerank passes produce.

use serde::{Deserialize, Serialize};

/// A bounded span of a document's text, stored with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Unique within a store. See [`chunk_id`].
    pub id: String,
    /// Path of the owning document.
    pub document_path: String,
    /// Display label, usually the document's base name.
    pub title: String,
    pub text: String,
    /// Embedding vector. `None` only while the embedding call is in flight;
    /// such chunks are invisible to search and never written to snapshots.
    pub embedding: Option<Vec<f32>>,
    /// Unix timestamp (seconds) of the owning document's last modification.
    pub last_modified: i64,
}

impl Chunk {
    /// Length of the embedding vector, if one is present.
    pub fn dims(&self) -> Option<usize> {
        self.embedding.as_ref().map(Vec::len)
    }
}

/// A ranked hit returned from [`search`](crate::search::search) or
/// [`rerank`](crate::rerank::rerank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub title: String,
    pub text: String,
    /// Unbounded after boosting; higher is better.
    pub score: f64,
}

/// A document handed to the write path.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub path: String,
    pub title: String,
    pub text: String,
    pub last_modified: i64,
}

impl DocumentInput {
    /// Build an input whose title is the base name of `path` without its
    /// extension.
    pub fn from_path(path: &str, text: &str, last_modified: i64) -> Self {
        Self {
            path: path.to_string(),
            title: title_from_path(path),
            text: text.to_string(),
            last_modified,
        }
    }
}

/// Derive a chunk id from the owning document path and the chunk's ordinal.
///
/// ```rust
/// use vaultsearch_core::models::chunk_id;
///
/// assert_eq!(chunk_id("notes/a.md", 2), "notes/a.md#2");
/// ```
pub fn chunk_id(document_path: &str, index: usize) -> String {
    format!("{}#{}", document_path, index)
}

/// Base name of a `/`-separated path with the final extension removed.
pub fn title_from_path(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(0) | None => base.to_string(),
        Some(dot) => base[..dot].to_string(),
    }
}
