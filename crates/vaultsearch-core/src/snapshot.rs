//! Point-in-time export of store contents, gated by embedding model.
//!
//! A [`Snapshot`] is a disposable copy used only for durability. It is
//! accepted on load only when its `modelName` equals the active embedding
//! model and its vectors are internally consistent; anything else means
//! "no usable snapshot" and the caller re-indexes from scratch. There is
//! never a partial merge.
//!
//! # Format
//!
//! ```json
//! {
//!   "modelName": "bge-small-en-v1.5",
//!   "updatedAt": 1760659200,
//!   "chunks": [
//!     { "id": "notes/a.md#0", "path": "notes/a.md", "text": "…", "title": "a",
//!       "embedding": [0.01, …], "lastModified": 1760650000 }
//!   ]
//! }
//! ```
//!
//! File I/O lives in the app crate; this module only converts between
//! stores, snapshots, and JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedding::EmbeddingModel;
use crate::models::Chunk;
use crate::store::memory::InMemoryStore;
use crate::store::ChunkStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub model_name: String,
    /// Unix timestamp (seconds) when the snapshot was taken.
    pub updated_at: i64,
    pub chunks: Vec<SnapshotChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotChunk {
    pub id: String,
    pub path: String,
    pub text: String,
    pub title: String,
    pub embedding: Vec<f32>,
    pub last_modified: i64,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize snapshot")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse snapshot")
    }

    pub fn dims(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    /// Why this snapshot cannot be used with `active_model`, if it cannot.
    pub fn incompatibility(&self, active_model: &str) -> Option<String> {
        if self.model_name != active_model {
            return Some(format!(
                "snapshot model '{}' does not match active model '{}'",
                self.model_name, active_model
            ));
        }
        if let Some(c) = self.chunks.iter().find(|c| c.id.is_empty()) {
            return Some(format!("chunk with empty id in document '{}'", c.path));
        }
        let Some(dims) = self.dims() else {
            return None;
        };
        if dims == 0 {
            return Some("chunk with empty embedding".to_string());
        }
        if let Some(c) = self.chunks.iter().find(|c| c.embedding.len() != dims) {
            return Some(format!(
                "mixed embedding dimensions ({} and {} in '{}')",
                dims,
                c.embedding.len(),
                c.id
            ));
        }
        if let Ok(model) = active_model.parse::<EmbeddingModel>() {
            if model.dims() != dims {
                return Some(format!(
                    "snapshot has {} dims, model '{}' produces {}",
                    dims,
                    model,
                    model.dims()
                ));
            }
        }
        None
    }
}

/// Capture every chunk of `store` that has an embedding.
///
/// Chunks still waiting for their embedding are skipped, never written as
/// partial records.
pub fn save<S: ChunkStore + ?Sized>(store: &S, model_name: &str) -> Snapshot {
    let mut chunks = Vec::with_capacity(store.len());
    store.scan(&mut |c: &Chunk| {
        if let Some(embedding) = &c.embedding {
            chunks.push(SnapshotChunk {
                id: c.id.clone(),
                path: c.document_path.clone(),
                text: c.text.clone(),
                title: c.title.clone(),
                embedding: embedding.clone(),
                last_modified: c.last_modified,
            });
        }
    });

    Snapshot {
        model_name: model_name.to_string(),
        updated_at: chrono::Utc::now().timestamp(),
        chunks,
    }
}

/// Rebuild a store from `snapshot` if it is usable with `active_model`.
///
/// Returns `None` on model mismatch or inconsistent content.
pub fn load(snapshot: Snapshot, active_model: &str) -> Option<InMemoryStore> {
    if let Some(reason) = snapshot.incompatibility(active_model) {
        warn!("discarding snapshot: {}", reason);
        return None;
    }

    info!(
        chunks = snapshot.chunks.len(),
        model = active_model,
        "restored snapshot"
    );
    Some(InMemoryStore::from_chunks(snapshot.chunks.into_iter().map(
        |c| Chunk {
            id: c.id,
            document_path: c.path,
            title: c.title,
            text: c.text,
            embedding: Some(c.embedding),
            last_modified: c.last_modified,
        },
    )))
}
