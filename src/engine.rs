//! Cache Façade Module
//!
//! The single entry point external collaborators consume. Wires the
//! negative cache, entry store, request coalescer, adaptive TTL controller
//! and metrics together, and owns the background task lifecycle.
//!
//! A `Cache` is explicitly constructed and passed around by reference (or
//! `Arc`); there is no ambient singleton. `close()` stops the background
//! tasks and, when persistence is enabled, writes a final snapshot.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    AdaptiveTtl, CacheStats, Compression, EntryStore, FlightGroup, FlightOutcome, Lookup,
    NegativeCache, StatsRecorder,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::persist::SnapshotManager;
use crate::tasks::{spawn_snapshot_task, spawn_sweep_task};

// == Get-Or-Load Options ==
/// Options recognized by [`Cache::get_or_load`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOrLoadOptions {
    /// On loader failure, serve an expired-but-present value instead of
    /// propagating the error
    pub accept_stale: bool,
    /// Maximum time this caller waits on the (possibly shared) fetch.
    /// A timeout does not cancel the fetch for other waiters.
    pub deadline: Option<Duration>,
}

// == Cache ==
/// The in-process cache engine façade.
pub struct Cache {
    store: Arc<RwLock<EntryStore>>,
    negative: Arc<RwLock<NegativeCache>>,
    adaptive: Arc<RwLock<AdaptiveTtl>>,
    flights: FlightGroup,
    stats: Arc<StatsRecorder>,
    snapshots: Option<Arc<SnapshotManager>>,
    default_ttl: Duration,
    adaptive_enabled: bool,
    coalescing_enabled: bool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Cache {
    // == Constructor ==
    /// Builds a cache from configuration, restores a snapshot if
    /// persistence is enabled, and starts the background sweep and
    /// snapshot tasks.
    pub async fn new(config: Config) -> Self {
        let stats = Arc::new(StatsRecorder::new());
        let compression =
            Compression::new(config.compression_enabled, config.compression_threshold);
        let store = Arc::new(RwLock::new(EntryStore::new(
            config.max_entries,
            config.max_memory_bytes,
            config.eviction_policy,
            compression,
            Arc::clone(&stats),
        )));
        let negative = Arc::new(RwLock::new(NegativeCache::new(Duration::from_secs(
            config.negative_ttl,
        ))));
        let adaptive = Arc::new(RwLock::new(AdaptiveTtl::new(
            Duration::from_secs(config.adaptive_ttl_floor),
            Duration::from_secs(config.adaptive_ttl_ceiling),
        )));

        let snapshots = config
            .persistence_enabled
            .then(|| Arc::new(SnapshotManager::new(config.persistence_path.clone())));
        if let Some(manager) = &snapshots {
            manager.restore(&store).await;
        }

        let mut tasks = Vec::new();
        if config.sweep_interval > 0 {
            tasks.push(spawn_sweep_task(
                Arc::clone(&store),
                Arc::clone(&negative),
                config.sweep_interval,
            ));
        }
        if let Some(manager) = &snapshots {
            if config.persistence_interval > 0 {
                tasks.push(spawn_snapshot_task(
                    Arc::clone(manager),
                    Arc::clone(&store),
                    config.persistence_interval,
                ));
            }
        }

        info!(
            max_entries = config.max_entries,
            max_memory_bytes = config.max_memory_bytes,
            policy = config.eviction_policy.name(),
            "cache initialized"
        );

        Self {
            store,
            negative,
            adaptive,
            flights: FlightGroup::new(),
            stats,
            snapshots,
            default_ttl: Duration::from_secs(config.default_ttl),
            adaptive_enabled: config.adaptive_ttl_enabled,
            coalescing_enabled: config.coalescing_enabled,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        }
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Consults the negative cache first, then the entry store. Returns
    /// None for unknown, expired or confirmed-absent keys.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        if self.negative.write().await.is_recorded_absent(key) {
            self.stats.record_negative_hit();
            return None;
        }
        match self.store.write().await.get(key) {
            Lookup::Hit(value) => Some(value),
            Lookup::Stale(_) | Lookup::Miss => None,
        }
    }

    // == Set ==
    /// Stores a value under `key`.
    ///
    /// When `ttl` is None, the default TTL is used, adjusted per key by the
    /// adaptive TTL controller if enabled. An explicit `ttl` always wins.
    ///
    /// # Errors
    /// [`CacheError::Capacity`] when the entry alone exceeds the memory
    /// limit, [`CacheError::Closed`] after `close()`.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }

        if self.adaptive_enabled {
            self.adaptive.write().await.observe_update(key);
        }
        let effective_ttl = self.resolve_ttl(key, ttl).await;

        self.store
            .write()
            .await
            .set(key.to_string(), value, effective_ttl)?;
        self.negative.write().await.forget(key);
        Ok(())
    }

    // == Delete ==
    /// Removes a key; returns whether it existed.
    pub async fn delete(&self, key: &str) -> bool {
        let removed = self.store.write().await.delete(key);
        if removed {
            self.adaptive.write().await.forget(key);
        }
        removed
    }

    /// Removes several keys; returns how many existed.
    pub async fn delete_many(&self, keys: &[&str]) -> usize {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await {
                removed += 1;
            }
        }
        removed
    }

    // == Get Or Load ==
    /// Retrieves a value, invoking `loader` on a miss.
    ///
    /// Concurrent calls for the same missing key share one loader
    /// invocation (unless coalescing is disabled); every caller receives
    /// the same value or the same error. The loader returns `Ok(None)` to
    /// report the key confirmed absent upstream, which is remembered in
    /// the negative cache for a short window.
    ///
    /// Loader failures do not poison the key; the next call tries again.
    /// With `opts.accept_stale`, a value that expired just before this
    /// call is served instead of a loader error.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
        opts: GetOrLoadOptions,
    ) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<Vec<u8>>>> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Closed);
        }

        if self.negative.write().await.is_recorded_absent(key) {
            self.stats.record_negative_hit();
            return Err(CacheError::NotFound(key.to_string()));
        }

        let stale = match self.store.write().await.get(key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Stale(value) => Some(value),
            Lookup::Miss => None,
        };

        let work = self.make_fetch_work(key, ttl, loader);

        let outcome: Result<Option<Vec<u8>>> = if self.coalescing_enabled {
            match self.flights.fetch_or_join(key, work, opts.deadline).await {
                Ok(flight) => {
                    if flight.joined {
                        self.stats.record_coalesced();
                    }
                    Ok(flight.value)
                }
                Err(e) => Err(e),
            }
        } else {
            let fut = work();
            let raw = match opts.deadline {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => return self.stale_or(stale, CacheError::Timeout(key.to_string()), opts),
                },
                None => fut.await,
            };
            raw.map_err(CacheError::Loader)
        };

        match outcome {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(CacheError::NotFound(key.to_string())),
            Err(e @ (CacheError::Loader(_) | CacheError::Timeout(_))) => {
                self.stale_or(stale, e, opts)
            }
            Err(e) => Err(e),
        }
    }

    // == Scan And Delete ==
    /// Removes all keys matching a glob pattern (`*` wildcards); returns
    /// how many were removed.
    pub async fn scan_and_delete(&self, pattern: &str) -> usize {
        self.store.write().await.scan_delete(pattern)
    }

    // == Flush All ==
    /// Removes every entry, negative record and adaptive history.
    pub async fn flush_all(&self) {
        let removed = self.store.write().await.flush();
        self.negative.write().await.clear();
        self.adaptive.write().await.clear();
        info!(removed, "cache flushed");
    }

    // == Stats ==
    /// Returns a point-in-time snapshot of cache metrics.
    pub async fn stats(&self) -> CacheStats {
        let (count, size) = {
            let guard = self.store.read().await;
            (guard.count(), guard.size_in_bytes())
        };
        self.stats.snapshot(count, size)
    }

    // == Close ==
    /// Stops background tasks and writes a final snapshot when persistence
    /// is enabled. Idempotent; operations after close fail with
    /// [`CacheError::Closed`] (reads return None).
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for handle in self.drain_tasks() {
            handle.abort();
        }

        if let Some(manager) = &self.snapshots {
            match manager.snapshot(&self.store).await {
                Ok(count) => info!("Final snapshot wrote {} entries", count),
                Err(e) => warn!("Final snapshot failed: {}", e),
            }
        }

        info!("cache closed");
    }

    // == Internals ==
    /// Picks the TTL for a write: explicit beats adaptive beats default.
    async fn resolve_ttl(&self, key: &str, explicit: Option<Duration>) -> Duration {
        match explicit {
            Some(ttl) => ttl,
            None if self.adaptive_enabled => {
                self.adaptive
                    .read()
                    .await
                    .suggest_ttl(key, self.default_ttl)
            }
            None => self.default_ttl,
        }
    }

    /// Builds the shared fetch future: run the loader, then store the
    /// result (or record absence) so every later caller hits the cache.
    fn make_fetch_work<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = FlightOutcome> + Send>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<Vec<u8>>>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let negative = Arc::clone(&self.negative);
        let adaptive = Arc::clone(&self.adaptive);
        let adaptive_enabled = self.adaptive_enabled;
        let default_ttl = self.default_ttl;
        let key = key.to_string();

        move || -> std::pin::Pin<Box<dyn Future<Output = FlightOutcome> + Send>> {
            let fut = loader();
            Box::pin(async move {
                match fut.await {
                    Ok(Some(value)) => {
                        if adaptive_enabled {
                            adaptive.write().await.observe_update(&key);
                        }
                        let effective_ttl = match ttl {
                            Some(ttl) => ttl,
                            None if adaptive_enabled => {
                                adaptive.read().await.suggest_ttl(&key, default_ttl)
                            }
                            None => default_ttl,
                        };

                        if let Err(e) =
                            store.write().await.set(key.clone(), value.clone(), effective_ttl)
                        {
                            // The caller still gets the value; it is just not cached
                            warn!(key = key.as_str(), "loaded value not cached: {}", e);
                        }
                        negative.write().await.forget(&key);
                        Ok(Some(value))
                    }
                    Ok(None) => {
                        debug!(key = key.as_str(), "upstream confirmed key absent");
                        negative.write().await.record_absent(&key);
                        Ok(None)
                    }
                    Err(e) => Err(format!("{:#}", e)),
                }
            })
        }
    }

    /// Serves a held stale value when allowed, otherwise the error.
    fn stale_or(
        &self,
        stale: Option<Vec<u8>>,
        error: CacheError,
        opts: GetOrLoadOptions,
    ) -> Result<Vec<u8>> {
        if opts.accept_stale {
            if let Some(value) = stale {
                debug!("loader failed, serving stale value: {}", error);
                return Ok(value);
            }
        }
        Err(error)
    }

    fn drain_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut guard = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard.drain(..).collect()
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        // Background tasks must never outlive the cache
        for handle in self.drain_tasks() {
            handle.abort();
        }
    }
}
