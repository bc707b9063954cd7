//! Index overview for `vsearch stats`.
//!
//! Reads the store restored from the snapshot (or, without persistent
//! storage, the vault indexed in memory): document and chunk counts, vector
//! dimension, and how recently notes were modified.

use anyhow::Result;
use std::collections::HashSet;

use vaultsearch_core::models::Chunk;
use vaultsearch_core::store::ChunkStore;

use crate::config::Config;
use crate::ingest::open_indexed;

#[derive(Debug, Default, PartialEq)]
struct IndexStats {
    documents: usize,
    chunks: usize,
    embedded: usize,
    dims: Option<usize>,
    newest: Option<i64>,
}

fn collect<S: ChunkStore + ?Sized>(store: &S) -> IndexStats {
    let mut stats = IndexStats::default();
    let mut paths = HashSet::new();
    store.scan(&mut |c: &Chunk| {
        stats.chunks += 1;
        paths.insert(c.document_path.clone());
        if let Some(d) = c.dims() {
            stats.embedded += 1;
            stats.dims.get_or_insert(d);
        }
        stats.newest = Some(stats.newest.map_or(c.last_modified, |n| n.max(c.last_modified)));
    });
    stats.documents = paths.len();
    stats
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let engine = open_indexed(config).await?;
    let stats = collect(engine.store.as_ref());

    let snapshot_size = engine
        .autosaver
        .as_ref()
        .and_then(|s| std::fs::metadata(s.file().path()).ok())
        .map(|m| m.len());

    println!("vaultsearch index");
    println!("=================");
    println!();
    println!("  Vault:       {}", config.vault.root.display());
    println!("  Model:       {}", engine.model_name());
    match (&engine.autosaver, snapshot_size) {
        (Some(saver), Some(size)) => println!(
            "  Snapshot:    {} ({})",
            saver.file().path().display(),
            format_bytes(size)
        ),
        (Some(saver), None) => println!("  Snapshot:    {} (missing)", saver.file().path().display()),
        (None, _) => println!("  Snapshot:    disabled"),
    }
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Chunks:      {}", stats.chunks);
    println!(
        "  Embedded:    {} / {}{}",
        stats.embedded,
        stats.chunks,
        stats.dims.map(|d| format!(" ({} dims)", d)).unwrap_or_default()
    );
    if let Some(ts) = stats.newest {
        println!("  Newest note: {}", format_ts_relative(ts));
    }
    println!();
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "3 hours ago" style, falling back to a date for old or future timestamps.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, plural(mins))
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, plural(days))
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
