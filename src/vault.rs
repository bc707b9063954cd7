//! Vault scanning: walk the notes folder and read every matching file.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use vaultsearch_core::models::{title_from_path, DocumentInput};

use crate::config::VaultConfig;

/// Directories never descended into, whatever `exclude_globs` says.
const ALWAYS_EXCLUDED: [&str; 4] = [".git", "target", "node_modules", ".obsidian"];

/// A note read from disk.
#[derive(Debug, Clone)]
pub struct NoteFile {
    /// Relative to the vault root, `/`-separated.
    pub path: String,
    pub title: String,
    pub body: String,
    /// Unix timestamp (seconds) of the last modification.
    pub modified: i64,
}

impl NoteFile {
    pub fn to_document(&self) -> DocumentInput {
        DocumentInput {
            path: self.path.clone(),
            title: self.title.clone(),
            text: self.body.clone(),
            last_modified: self.modified,
        }
    }
}

/// Every note under `config.root` matching the include globs and none of
/// the exclude globs, sorted by path. Files that are not valid UTF-8 are
/// skipped with a warning.
pub fn scan_vault(config: &VaultConfig) -> Result<Vec<NoteFile>> {
    let root = &config.root;
    if !root.is_dir() {
        bail!("Vault root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut notes = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(|e| !is_always_excluded(e));
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match read_note(path, rel_str) {
            Ok(Some(note)) => notes.push(note),
            Ok(None) => {}
            Err(e) => warn!("skipping {}: {:#}", path.display(), e),
        }
    }

    notes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(notes)
}

fn read_note(path: &Path, relative: String) -> Result<Option<NoteFile>> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let bytes = std::fs::read(path)?;
    let Ok(body) = String::from_utf8(bytes) else {
        warn!("skipping non-UTF-8 file {}", path.display());
        return Ok(None);
    };

    Ok(Some(NoteFile {
        title: title_from_path(&relative),
        path: relative,
        body,
        modified,
    }))
}

fn is_always_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ALWAYS_EXCLUDED.contains(&name))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
