//! Persistence Module
//!
//! Snapshots the entry store to a single JSON blob and restores it at
//! startup so a restart does not begin with a cold cache. Restore is
//! best-effort by design: a missing, corrupt or version-mismatched
//! snapshot is discarded with a warning and the cache starts empty.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{current_timestamp_ms, EntryStore};
use crate::error::{CacheError, Result};

// == Format ==
/// Current snapshot format version; any other version no-ops on restore.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    taken_at: String,
    entries: Vec<SnapshotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: String,
    /// Stored value bytes, base64-encoded (compressed bytes stay compressed)
    value: String,
    /// Absolute expiry (Unix milliseconds)
    expires_at: u64,
    compressed: bool,
}

// == Snapshot Manager ==
/// Serializes the live entry store to disk and reloads it.
#[derive(Debug)]
pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    /// Creates a manager writing to / reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Snapshot ==
    /// Writes all live (non-expired) entries to the snapshot file.
    ///
    /// The store is read under a read lock for a consistent view; the file
    /// is written to a temporary sibling and renamed into place so a crash
    /// mid-write never leaves a truncated snapshot behind.
    ///
    /// Returns the number of entries written.
    pub async fn snapshot(&self, store: &RwLock<EntryStore>) -> Result<usize> {
        let file = {
            let guard = store.read().await;
            let entries: Vec<SnapshotRecord> = guard
                .iter_entries()
                .filter(|(_, entry)| !entry.is_expired())
                .map(|(key, entry)| SnapshotRecord {
                    key: key.clone(),
                    value: STANDARD.encode(&entry.value),
                    expires_at: entry.expires_at,
                    compressed: entry.compressed,
                })
                .collect();
            SnapshotFile {
                version: SNAPSHOT_FORMAT_VERSION,
                taken_at: chrono::Utc::now().to_rfc3339(),
                entries,
            }
        };

        let count = file.entries.len();
        let json = serde_json::to_vec(&file)
            .map_err(|e| CacheError::Persistence(format!("serialize snapshot: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| CacheError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CacheError::Persistence(format!("rename into place: {}", e)))?;

        debug!(entries = count, path = %self.path.display(), "snapshot written");
        Ok(count)
    }

    // == Restore ==
    /// Loads the snapshot file into the store, skipping entries whose
    /// expiry has already passed. Never fails: any problem with the file
    /// is logged and the cache simply starts empty.
    ///
    /// Returns the number of entries restored.
    pub async fn restore(&self, store: &RwLock<EntryStore>) -> usize {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot to restore");
                return 0;
            }
            Err(e) => {
                warn!(path = %self.path.display(), "unreadable snapshot, starting empty: {}", e);
                return 0;
            }
        };

        let file: SnapshotFile = match serde_json::from_slice(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), "corrupt snapshot, starting empty: {}", e);
                return 0;
            }
        };

        if file.version != SNAPSHOT_FORMAT_VERSION {
            warn!(
                found = file.version,
                expected = SNAPSHOT_FORMAT_VERSION,
                "unsupported snapshot version, starting empty"
            );
            return 0;
        }

        let now = current_timestamp_ms();
        let mut restored = 0;
        let mut guard = store.write().await;
        for record in file.entries {
            if record.expires_at <= now {
                continue;
            }
            match STANDARD.decode(&record.value) {
                Ok(value) => {
                    guard.restore_entry(record.key, value, record.compressed, record.expires_at);
                    restored += 1;
                }
                Err(e) => {
                    warn!(key = record.key.as_str(), "skipping undecodable snapshot entry: {}", e);
                }
            }
        }
        drop(guard);

        info!(entries = restored, path = %self.path.display(), "snapshot restored");
        restored
    }
}
