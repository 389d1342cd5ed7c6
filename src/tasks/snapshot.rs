//! Periodic Snapshot Task
//!
//! Background task that persists the entry store on a fixed interval when
//! persistence is enabled. Failures are logged and the cache keeps
//! serving from memory; persistence is never allowed to take the cache
//! down with it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::EntryStore;
use crate::persist::SnapshotManager;

/// Spawns a background task that periodically snapshots the store.
///
/// # Arguments
/// * `manager` - Snapshot manager owning the file path
/// * `store` - Shared entry store
/// * `interval_secs` - Interval in seconds between snapshots
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by the cache on shutdown.
pub fn spawn_snapshot_task(
    manager: Arc<SnapshotManager>,
    store: Arc<RwLock<EntryStore>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting snapshot task with interval of {} seconds, path {}",
            interval_secs,
            manager.path().display()
        );

        loop {
            tokio::time::sleep(interval).await;

            match manager.snapshot(&store).await {
                Ok(count) => debug!("Periodic snapshot wrote {} entries", count),
                Err(e) => warn!("Periodic snapshot failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Compression, EvictionPolicy, StatsRecorder};

    #[tokio::test]
    async fn test_snapshot_task_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("periodic.json");
        let manager = Arc::new(SnapshotManager::new(&path));

        let store = Arc::new(RwLock::new(EntryStore::new(
            100,
            1 << 20,
            EvictionPolicy::Lru,
            Compression::new(false, 0),
            Arc::new(StatsRecorder::new()),
        )));
        store
            .write()
            .await
            .set("k".to_string(), b"v".to_vec(), Duration::from_secs(60))
            .unwrap();

        let handle = spawn_snapshot_task(manager, Arc::clone(&store), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.abort();

        assert!(path.exists(), "Snapshot file should have been written");
    }
}
