//! Expired-Entry Sweep Task
//!
//! Background task that periodically removes expired cache entries and
//! stale negative-cache records. Expiry is still enforced lazily on every
//! access; the sweep only reclaims memory for keys nobody asks about.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{EntryStore, NegativeCache};

/// Spawns a background task that periodically sweeps expired state.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. It takes a write lock on the store and the negative
/// cache only for the duration of each sweep.
///
/// # Arguments
/// * `store` - Shared entry store
/// * `negative` - Shared negative cache
/// * `interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, aborted by the cache on shutdown.
pub fn spawn_sweep_task(
    store: Arc<RwLock<EntryStore>>,
    negative: Arc<RwLock<NegativeCache>>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        info!("Starting expired-entry sweep task with interval of {} seconds", interval_secs);

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = store.write().await;
                guard.cleanup_expired()
            };
            let purged = {
                let mut guard = negative.write().await;
                guard.purge_expired()
            };

            if removed > 0 || purged > 0 {
                info!(
                    "Sweep: removed {} expired entries, {} stale negative records",
                    removed, purged
                );
            } else {
                debug!("Sweep: nothing expired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Compression, EvictionPolicy, Lookup, StatsRecorder};

    fn shared_store() -> Arc<RwLock<EntryStore>> {
        Arc::new(RwLock::new(EntryStore::new(
            100,
            1 << 20,
            EvictionPolicy::Lru,
            Compression::new(false, 0),
            Arc::new(StatsRecorder::new()),
        )))
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let store = shared_store();
        let negative = Arc::new(RwLock::new(NegativeCache::new(Duration::from_millis(100))));

        {
            let mut guard = store.write().await;
            guard
                .set("expire_soon".to_string(), b"value".to_vec(), Duration::from_millis(200))
                .unwrap();
        }
        negative.write().await.record_absent("gone");

        let handle = spawn_sweep_task(Arc::clone(&store), Arc::clone(&negative), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.write().await.get("expire_soon"), Lookup::Miss);
        assert_eq!(negative.read().await.len(), 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let store = shared_store();
        let negative = Arc::new(RwLock::new(NegativeCache::new(Duration::from_secs(60))));

        {
            let mut guard = store.write().await;
            guard
                .set("long_lived".to_string(), b"value".to_vec(), Duration::from_secs(3600))
                .unwrap();
        }

        let handle = spawn_sweep_task(Arc::clone(&store), negative, 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(
            store.write().await.get("long_lived"),
            Lookup::Hit(b"value".to_vec())
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let store = shared_store();
        let negative = Arc::new(RwLock::new(NegativeCache::new(Duration::from_secs(60))));

        let handle = spawn_sweep_task(store, negative, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
