//! Storage abstraction for chunk records.
//!
//! The [`ChunkStore`] trait is the seam between the engine and where chunks
//! live. Search and persistence only read through it; the write path goes
//! through [`upsert`](ChunkStore::upsert) and
//! [`replace_document`](ChunkStore::replace_document).
//!
//! Implementations must be `Send + Sync` and must make every method safe to
//! call concurrently: searches run while indexing writes are in progress.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](ChunkStore::upsert) | Insert or replace one chunk by id |
//! | [`replace_document`](ChunkStore::replace_document) | Swap all chunks of one document at once |
//! | [`remove_document`](ChunkStore::remove_document) | Drop every chunk of a document |
//! | [`clear`](ChunkStore::clear) | Drop everything |
//! | [`len`](ChunkStore::len) | Number of chunks held |
//! | [`scan`](ChunkStore::scan) | Visit every chunk in insertion order |
//! | [`chunks`](ChunkStore::chunks) | Owned copy of every chunk in insertion order |

pub mod memory;

use anyhow::Result;

use crate::models::Chunk;

/// A keyed collection of [`Chunk`]s with document-level bulk operations.
pub trait ChunkStore: Send + Sync {
    /// Insert `chunk`, or replace the chunk with the same id in place.
    ///
    /// Fails only when the id is empty. Embedding dimensions are not checked
    /// here; see [`Retriever`](crate::retriever::Retriever).
    fn upsert(&self, chunk: Chunk) -> Result<()>;

    /// Remove every chunk of `path` and insert `chunks` in a single step, so
    /// that no reader observes the document with zero chunks.
    ///
    /// Returns the number of chunks removed.
    fn replace_document(&self, path: &str, chunks: Vec<Chunk>) -> Result<usize>;

    /// Remove every chunk whose `document_path` equals `path`.
    ///
    /// Returns the number removed; `0` when nothing matched.
    fn remove_document(&self, path: &str) -> usize;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call `visit` for every chunk, in insertion order, against a consistent
    /// view of the store.
    fn scan(&self, visit: &mut dyn FnMut(&Chunk));

    /// Owned copy of every chunk, in insertion order.
    fn chunks(&self) -> Vec<Chunk> {
        let mut out = Vec::with_capacity(self.len());
        self.scan(&mut |c: &Chunk| out.push(c.clone()));
        out
    }

    /// Distinct document paths, in order of first appearance.
    fn document_paths(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        self.scan(&mut |c: &Chunk| {
            if seen.insert(c.document_path.clone()) {
                out.push(c.document_path.clone());
            }
        });
        out
    }

    /// Embedding length of the first chunk that has one.
    ///
    /// The default visits every chunk; stores with direct access should
    /// stop at the first embedded one.
    fn embedding_dims(&self) -> Option<usize> {
        let mut dims = None;
        self.scan(&mut |c: &Chunk| {
            if dims.is_none() {
                dims = c.dims();
            }
        });
        dims
    }
}
