//! In-memory [`ChunkStore`] implementation.
//!
//! Chunks live in a `Vec` (insertion order, which search uses to break score
//! ties) with a `HashMap` from id to position, both behind one
//! `std::sync::RwLock`. Readers share the lock; writers hold it only for the
//! in-memory mutation, never across an embedding call.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};

use crate::models::Chunk;

use super::ChunkStore;

#[derive(Default)]
struct Inner {
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl Inner {
    fn reindex(&mut self) {
        self.positions = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
    }

    fn insert(&mut self, chunk: Chunk) {
        match self.positions.get(&chunk.id) {
            Some(&pos) => self.chunks[pos] = chunk,
            None => {
                self.positions.insert(chunk.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
            }
        }
    }

    fn remove_path(&mut self, path: &str) -> usize {
        let before = self.chunks.len();
        self.chunks.retain(|c| c.document_path != path);
        let removed = before - self.chunks.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }
}

/// In-memory chunk store. Construct at startup, drop at shutdown.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `chunks`, later ids replacing earlier.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let mut inner = Inner::default();
        for c in chunks {
            inner.insert(c);
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    // No mutation of `Inner` can panic halfway, so a poisoned lock still
    // guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChunkStore for InMemoryStore {
    fn upsert(&self, chunk: Chunk) -> Result<()> {
        if chunk.id.is_empty() {
            bail!("chunk id must not be empty");
        }
        self.write().insert(chunk);
        Ok(())
    }

    fn replace_document(&self, path: &str, chunks: Vec<Chunk>) -> Result<usize> {
        if let Some(c) = chunks.iter().find(|c| c.id.is_empty()) {
            bail!("chunk id must not be empty (document {})", c.document_path);
        }
        let mut inner = self.write();
        let removed = inner.remove_path(path);
        for c in chunks {
            inner.insert(c);
        }
        Ok(removed)
    }

    fn remove_document(&self, path: &str) -> usize {
        self.write().remove_path(path)
    }

    fn clear(&self) {
        let mut inner = self.write();
        inner.chunks.clear();
        inner.positions.clear();
    }

    fn len(&self) -> usize {
        self.read().chunks.len()
    }

    fn scan(&self, visit: &mut dyn FnMut(&Chunk)) {
        for c in &self.read().chunks {
            visit(c);
        }
    }

    fn embedding_dims(&self) -> Option<usize> {
        self.read().chunks.iter().find_map(Chunk::dims)
    }
}
