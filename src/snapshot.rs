//! Snapshot files on disk and the periodic autosaver.
//!
//! [`SnapshotFile`] turns every way a snapshot can be unusable (missing,
//! unreadable, malformed, wrong model) into `None`. Saves write a sibling
//! temp file and rename it over the target, so a crash mid-save leaves the
//! previous snapshot intact.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vaultsearch_core::snapshot::{self, Snapshot};
use vaultsearch_core::store::ChunkStore;

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot if it exists, parses, and was made by `active_model`.
    pub fn load(&self, active_model: &str) -> Option<Snapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no snapshot at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("cannot read snapshot {}: {}", self.path.display(), e);
                return None;
            }
        };

        let snap = match Snapshot::from_json(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring malformed snapshot {}: {:#}", self.path.display(), e);
                return None;
            }
        };

        if let Some(reason) = snap.incompatibility(active_model) {
            info!("ignoring snapshot {}: {}", self.path.display(), reason);
            return None;
        }
        Some(snap)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = snapshot.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// Serializes snapshot saves: a save requested while another is running is
/// skipped, never overlapped.
pub struct Autosaver {
    file: SnapshotFile,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Autosaver {
    pub fn new(file: SnapshotFile) -> Self {
        Self {
            file,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }

    /// Capture `store` and write it out. Returns the number of chunks saved,
    /// or `None` when another save was already in flight.
    pub async fn save_now<S: ChunkStore + ?Sized>(
        &self,
        store: &S,
        model_name: &str,
    ) -> Result<Option<usize>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            info!("snapshot save already in progress, skipping");
            return Ok(None);
        }
        let _guard = InFlight(&self.in_flight);

        let snap = snapshot::save(store, model_name);
        let count = snap.chunks.len();
        let file = self.file.clone();
        tokio::task::spawn_blocking(move || file.save(&snap)).await??;

        debug!(chunks = count, path = %self.file.path.display(), "snapshot saved");
        Ok(Some(count))
    }

    /// Save every `every` until the returned task is aborted. The first save
    /// happens one period after spawning.
    pub fn spawn<S>(self: Arc<Self>, store: Arc<S>, model_name: String, every: Duration) -> JoinHandle<()>
    where
        S: ChunkStore + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.save_now(store.as_ref(), &model_name).await {
                    warn!("autosave failed: {:#}", e);
                }
            }
        })
    }
}
