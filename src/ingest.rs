//! Vault indexing: `vsearch index`.
//!
//! Brings the store in line with the notes on disk:
//! 1. drop documents whose file no longer exists;
//! 2. re-index notes that are new or modified since they were indexed
//!    (every note with `--full`, after clearing the store);
//! 3. save the snapshot when persistent storage is on.
//!
//! Each note is embedded completely before its chunks replace the old ones,
//! so a concurrent search never sees a note with no chunks.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use vaultsearch_core::models::Chunk;
use vaultsearch_core::store::ChunkStore;

use crate::config::Config;
use crate::engine::Engine;
use crate::vault::{scan_vault, NoteFile};

/// Counts reported by [`index_notes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub scanned: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub chunks: usize,
    pub fallbacks: usize,
}

pub async fn run_index(config: &Config, full: bool) -> Result<()> {
    let engine = Engine::open(config)?;
    let notes = scan_vault(&config.vault)?;
    let summary = index_notes(&engine, &notes, full).await?;
    let saved = engine.save().await?;

    println!("index {}", config.vault.root.display());
    println!("  model: {}", engine.model_name());
    println!("  notes scanned: {}", summary.scanned);
    println!("  notes indexed: {}", summary.indexed);
    println!("  notes unchanged: {}", summary.unchanged);
    println!("  notes removed: {}", summary.removed);
    println!("  chunks written: {}", summary.chunks);
    println!("  fallback embeddings: {}", summary.fallbacks);
    println!("  chunks in store: {}", engine.store.len());
    if let (Some(count), Some(saver)) = (saved, &engine.autosaver) {
        println!("  snapshot: {} ({} chunks)", saver.file().path().display(), count);
    }
    println!("ok");
    Ok(())
}

/// Open the engine for a read command. Without persistent storage there is
/// no snapshot to read, so the vault is indexed in memory first.
pub async fn open_indexed(config: &Config) -> Result<Engine> {
    let engine = Engine::open(config)?;
    if !config.storage.use_persistent_storage {
        let notes = scan_vault(&config.vault)?;
        index_notes(&engine, &notes, true).await?;
    } else if engine.store.is_empty() {
        warn!("the index is empty; run `vsearch index` first");
    }
    Ok(engine)
}

pub async fn run_remove(config: &Config, path: &str) -> Result<()> {
    let engine = Engine::open(config)?;
    let removed = engine.retriever.remove_document(engine.store.as_ref(), path);
    if removed > 0 {
        engine.save().await?;
    }
    println!("removed {} chunk{} for {}", removed, if removed == 1 { "" } else { "s" }, path);
    Ok(())
}

/// Index `notes` into the engine's store. See the module docs for the steps.
pub async fn index_notes(engine: &Engine, notes: &[NoteFile], full: bool) -> Result<IndexSummary> {
    let store = engine.store.as_ref();
    let mut summary = IndexSummary {
        scanned: notes.len(),
        ..IndexSummary::default()
    };

    if full {
        store.clear();
    } else {
        let on_disk: HashSet<&str> = notes.iter().map(|n| n.path.as_str()).collect();
        for path in store.document_paths() {
            if !on_disk.contains(path.as_str()) {
                store.remove_document(&path);
                summary.removed += 1;
            }
        }
    }

    let indexed_at = last_modified_by_path(store);
    for note in notes {
        let stale = indexed_at
            .get(note.path.as_str())
            .map_or(true, |&ts| note.modified > ts);
        if !full && !stale {
            summary.unchanged += 1;
            continue;
        }

        let report = engine
            .retriever
            .index_document(store, &note.to_document())
            .await?;
        summary.indexed += 1;
        summary.chunks += report.chunks;
        summary.fallbacks += report.fallbacks;
    }

    if summary.fallbacks > 0 && engine.config.embedding.is_enabled() {
        warn!(
            fallbacks = summary.fallbacks,
            "some chunks were embedded with fallback vectors; check the embedding provider"
        );
    }
    info!(
        indexed = summary.indexed,
        removed = summary.removed,
        chunks = summary.chunks,
        "index complete"
    );
    Ok(summary)
}

/// Newest `last_modified` of each stored document.
fn last_modified_by_path<S: ChunkStore + ?Sized>(store: &S) -> HashMap<String, i64> {
    let mut out: HashMap<String, i64> = HashMap::new();
    store.scan(&mut |c: &Chunk| {
        let entry = out.entry(c.document_path.clone()).or_insert(c.last_modified);
        *entry = (*entry).max(c.last_modified);
    });
    out
}
