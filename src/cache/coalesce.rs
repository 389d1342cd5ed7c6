//! Request Coalescing Module
//!
//! Collapses concurrent fetch-on-miss calls for the same key into a single
//! upstream fetch. The first caller for a key spawns the fetch as a
//! detached task; every caller (first included) subscribes to a broadcast
//! of its outcome. Waiters may time out individually without cancelling
//! the shared fetch, which keeps running and still populates the cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{CacheError, Result};

// == Flight Outcome ==
/// Shared result of one in-flight fetch, cloned to every waiter.
///
/// `Ok(None)` means the upstream confirmed the key absent. Errors travel
/// as strings because the same outcome is cloned across waiters.
pub type FlightOutcome = std::result::Result<Option<Vec<u8>>, String>;

/// What `fetch_or_join` hands back to the façade.
#[derive(Debug)]
pub struct FlightResult {
    /// Loaded value, or None when the upstream confirmed absence
    pub value: Option<Vec<u8>>,
    /// True when this caller joined a fetch started by another caller
    pub joined: bool,
}

type InflightMap = Arc<Mutex<HashMap<String, broadcast::Sender<FlightOutcome>>>>;

// == Flight Group ==
/// Per-key deduplication of concurrent fetches.
///
/// Invariant: at most one in-flight fetch exists per key; its map entry is
/// removed before the outcome is broadcast, so a caller arriving after
/// completion starts a fresh fetch rather than observing a stale one.
#[derive(Debug, Default)]
pub struct FlightGroup {
    inflight: InflightMap,
}

impl FlightGroup {
    /// Creates an empty flight group.
    pub fn new() -> Self {
        Self::default()
    }

    // == Fetch Or Join ==
    /// Runs `work` for `key` unless a fetch is already in flight, in which
    /// case this caller subscribes to it instead.
    ///
    /// The work future is spawned detached: a waiter hitting `deadline`
    /// receives a timeout error while the fetch itself continues for the
    /// benefit of other waiters and of the cache.
    ///
    /// # Arguments
    /// * `key` - Coalescing key
    /// * `work` - Builds the fetch future; invoked only for the first caller
    /// * `deadline` - Optional cap on how long this caller waits
    pub async fn fetch_or_join<F, Fut>(
        &self,
        key: &str,
        work: F,
        deadline: Option<Duration>,
    ) -> Result<FlightResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightOutcome> + Send + 'static,
    {
        let (mut rx, joined) = {
            let mut inflight = lock(&self.inflight);
            match inflight.entry(key.to_string()) {
                Entry::Occupied(occupied) => (occupied.get().subscribe(), true),
                Entry::Vacant(vacant) => {
                    let (tx, rx) = broadcast::channel(1);
                    vacant.insert(tx.clone());

                    let fut = work();
                    let inflight = Arc::clone(&self.inflight);
                    let key = key.to_string();
                    tokio::spawn(async move {
                        let outcome = fut.await;
                        // Remove before sending: late arrivals start anew
                        lock(&inflight).remove(&key);
                        // No receivers left is fine; the value is already stored
                        let _ = tx.send(outcome);
                    });

                    (rx, false)
                }
            }
        };

        if joined {
            debug!(key, "joining in-flight fetch");
        }

        let outcome = match deadline {
            Some(limit) => match timeout(limit, rx.recv()).await {
                Ok(received) => received,
                Err(_) => return Err(CacheError::Timeout(key.to_string())),
            },
            None => rx.recv().await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(FlightResult { value, joined }),
            Ok(Err(message)) => Err(CacheError::Loader(message)),
            // Sender dropped without a result (fetch task aborted/panicked)
            Err(_) => Err(CacheError::Loader(format!(
                "in-flight fetch for '{}' was aborted",
                key
            ))),
        }
    }

    /// Number of fetches currently in flight.
    pub fn inflight_count(&self) -> usize {
        lock(&self.inflight).len()
    }
}

/// Locks the in-flight map, recovering from a poisoned lock.
///
/// The map only ever holds senders, so state behind a panicked holder is
/// still consistent.
fn lock(
    map: &Mutex<HashMap<String, broadcast::Sender<FlightOutcome>>>,
) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<FlightOutcome>>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_single_caller_runs_work() {
        let group = FlightGroup::new();

        let result = group
            .fetch_or_join("k", || async { Ok(Some(b"value".to_vec())) }, None)
            .await
            .unwrap();

        assert_eq!(result.value, Some(b"value".to_vec()));
        assert!(!result.joined);
        assert_eq!(group.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let group = Arc::new(FlightGroup::new());
        let calls = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let group = Arc::clone(&group);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                group
                    .fetch_or_join(
                        "shared",
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(Some(b"v".to_vec()))
                        },
                        None,
                    )
                    .await
            }));
        }

        let mut join_count = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result.value, Some(b"v".to_vec()));
            if result.joined {
                join_count += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "loader must run once");
        assert_eq!(join_count, 49, "all but the first caller join");
    }

    #[tokio::test]
    async fn test_error_propagates_to_all_waiters() {
        let group = Arc::new(FlightGroup::new());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let group = Arc::clone(&group);
            handles.push(tokio::spawn(async move {
                group
                    .fetch_or_join(
                        "failing",
                        || async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Err("upstream exploded".to_string())
                        },
                        None,
                    )
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, CacheError::Loader(ref m) if m == "upstream exploded"));
        }
    }

    #[tokio::test]
    async fn test_waiter_deadline_does_not_cancel_fetch() {
        let group = Arc::new(FlightGroup::new());
        let calls = Arc::new(AtomicU64::new(0));

        let slow_calls = Arc::clone(&calls);
        let impatient = group.fetch_or_join(
            "slow",
            move || async move {
                slow_calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Some(b"late".to_vec()))
            },
            Some(Duration::from_millis(20)),
        );

        let err = impatient.await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));

        // The fetch is still in flight after the waiter gave up
        assert_eq!(group.inflight_count(), 1);

        // A patient second caller joins the same fetch and gets the value;
        // were a second fetch started it would see "fresh" instead
        let result = group
            .fetch_or_join("slow", || async { Ok(Some(b"fresh".to_vec())) }, None)
            .await
            .unwrap();
        assert_eq!(result.value, Some(b"late".to_vec()));
        assert!(result.joined);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_fetch_independently() {
        let group = FlightGroup::new();
        let calls = Arc::new(AtomicU64::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let result = group
                .fetch_or_join(
                    "seq",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Some(b"v".to_vec()))
                    },
                    None,
                )
                .await
                .unwrap();
            assert!(!result.joined);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_confirmed_absent_reaches_all_waiters() {
        let group = FlightGroup::new();

        let result = group
            .fetch_or_join("missing", || async { Ok(None) }, None)
            .await
            .unwrap();
        assert_eq!(result.value, None);
    }
}
