//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions,
//! coalesced fetches and compression savings.
//!
//! The recorder uses relaxed atomic counters so no caller ever blocks on
//! metrics updates; `CacheStats` is the point-in-time snapshot handed out
//! to observers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Stats Recorder ==
/// Shared, lock-free metrics aggregator incremented by every component.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    coalesced: AtomicU64,
    negative_hits: AtomicU64,
    expired_removals: AtomicU64,
    compression_savings_bytes: AtomicU64,
}

impl StatsRecorder {
    /// Creates a new recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the hit counter.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the miss counter.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the eviction counter.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the coalesced-fetch counter (a caller joined an in-flight fetch).
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the negative-cache hit counter.
    pub fn record_negative_hit(&self) {
        self.negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the expired-removal counter (lazy expiry or sweep).
    pub fn record_expired_removal(&self) {
        self.expired_removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds the bytes saved by compressing one value.
    pub fn record_compression_savings(&self, saved: u64) {
        self.compression_savings_bytes
            .fetch_add(saved, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Produces a point-in-time snapshot, combined with the store's
    /// current entry count and size accounting.
    pub fn snapshot(&self, total_entries: usize, size_bytes: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            expired_removals: self.expired_removals.load(Ordering::Relaxed),
            compression_savings_bytes: self.compression_savings_bytes.load(Ordering::Relaxed),
            total_entries,
            size_bytes,
        }
    }
}

// == Cache Stats ==
/// Point-in-time cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted due to the configured policy
    pub evictions: u64,
    /// Number of callers that joined an already in-flight fetch
    pub coalesced: u64,
    /// Number of lookups short-circuited by the negative cache
    pub negative_hits: u64,
    /// Number of entries removed because their TTL elapsed
    pub expired_removals: u64,
    /// Total bytes saved by storing values compressed
    pub compression_savings_bytes: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current estimated memory footprint in bytes
    pub size_bytes: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
