//! Entry Store Module
//!
//! Main cache engine combining HashMap storage with policy-driven eviction,
//! memory accounting, TTL expiration and transparent value compression.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{
    CacheEntry, Compression, EvictionPolicy, StatsRecorder, ENTRY_OVERHEAD_BYTES,
};
use crate::error::{CacheError, Result};

// == Lookup Outcome ==
/// Result of a store lookup.
///
/// An expired entry is removed on access (a miss, per the TTL contract)
/// but its decompressed bytes ride along as `Stale` so the façade can fall
/// back to them when a loader fails and the caller accepts stale values.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Live entry; recency and frequency bookkeeping were updated
    Hit(Vec<u8>),
    /// The entry had expired; it was removed, its last value is returned
    Stale(Vec<u8>),
    /// No entry for the key
    Miss,
}

// == Entry Store ==
/// Bounded key-value storage with eviction, TTL and memory accounting.
#[derive(Debug)]
pub struct EntryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Running estimated footprint of all entries
    size_bytes: usize,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Maximum estimated footprint allowed
    max_memory_bytes: usize,
    /// Victim-selection policy
    policy: EvictionPolicy,
    /// Transparent value compression
    compression: Compression,
    /// Shared metrics recorder
    stats: Arc<StatsRecorder>,
}

impl EntryStore {
    // == Constructor ==
    /// Creates a new EntryStore.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the store can hold
    /// * `max_memory_bytes` - Estimated memory budget in bytes
    /// * `policy` - Eviction policy applied when either limit is exceeded
    /// * `compression` - Compression manager for stored values
    /// * `stats` - Shared metrics recorder
    pub fn new(
        max_entries: usize,
        max_memory_bytes: usize,
        policy: EvictionPolicy,
        compression: Compression,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            size_bytes: 0,
            max_entries,
            max_memory_bytes,
            policy,
            compression,
            stats,
        }
    }

    // == Set ==
    /// Stores a key-value pair with the given TTL.
    ///
    /// If the key already exists the value is overwritten, the version is
    /// incremented and the original creation time is preserved. If the
    /// post-insert state exceeds the entry-count or memory limit, entries
    /// are evicted one at a time until both limits hold.
    ///
    /// # Errors
    /// Returns [`CacheError::Capacity`] when the entry on its own exceeds
    /// the whole memory budget; nothing is evicted in that case.
    pub fn set(&mut self, key: String, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let original_len = value.len();
        let (stored, compressed) = self.compression.maybe_compress(&value);
        if compressed {
            self.stats
                .record_compression_savings((original_len - stored.len()) as u64);
        }

        let entry_size = estimate_size(&key, stored.len());
        if entry_size > self.max_memory_bytes {
            return Err(CacheError::Capacity(format!(
                "entry '{}' needs {} bytes but the memory limit is {}",
                key, entry_size, self.max_memory_bytes
            )));
        }

        let mut entry = CacheEntry::new(stored, compressed, ttl, entry_size);
        if let Some(prev) = self.entries.get(&key) {
            entry.created_at = prev.created_at;
            entry.version = prev.version + 1;
        }

        if let Some(prev) = self.entries.insert(key.clone(), entry) {
            self.size_bytes = self.size_bytes.saturating_sub(prev.size_bytes);
        }
        self.size_bytes += entry_size;

        self.evict_until_within_limits(&key);
        Ok(())
    }

    // == Get ==
    /// Looks up a key, updating recency/frequency bookkeeping on a hit.
    ///
    /// Expired entries are removed lazily and reported as [`Lookup::Stale`];
    /// they count as misses. Values are decompressed transparently; an
    /// undecompressable entry is dropped and reported as a miss rather than
    /// surfacing an error.
    pub fn get(&mut self, key: &str) -> Lookup {
        let Some(entry) = self.entries.get_mut(key) else {
            self.stats.record_miss();
            return Lookup::Miss;
        };

        if entry.is_expired() {
            let expired = match self.entries.remove(key) {
                Some(entry) => entry,
                None => {
                    self.stats.record_miss();
                    return Lookup::Miss;
                }
            };
            self.size_bytes = self.size_bytes.saturating_sub(expired.size_bytes);
            self.stats.record_miss();
            self.stats.record_expired_removal();
            return match self.unpack(expired.value, expired.compressed, key) {
                Some(value) => Lookup::Stale(value),
                None => Lookup::Miss,
            };
        }

        entry.touch();
        let raw = entry.value.clone();
        let compressed = entry.compressed;
        match self.unpack(raw, compressed, key) {
            Some(value) => {
                self.stats.record_hit();
                Lookup::Hit(value)
            }
            None => {
                // Corrupt stored bytes degrade to a miss
                if let Some(entry) = self.entries.remove(key) {
                    self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
                }
                self.stats.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Delete ==
    /// Removes an entry by key; returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
                true
            }
            None => false,
        }
    }

    // == Scan And Delete ==
    /// Removes all entries whose key matches a glob pattern (`*` wildcards).
    ///
    /// Returns the number of entries removed.
    pub fn scan_delete(&mut self, pattern: &str) -> usize {
        let matching: Vec<String> = self
            .entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        for key in &matching {
            self.delete(key);
        }
        matching.len()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries; returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            if let Some(entry) = self.entries.remove(key) {
                self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
                self.stats.record_expired_removal();
            }
        }
        expired_keys.len()
    }

    // == Flush ==
    /// Removes every entry; returns how many were removed.
    pub fn flush(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.size_bytes = 0;
        count
    }

    // == Restore Entry ==
    /// Reinserts an entry from a persisted snapshot, keeping its absolute
    /// expiry. Entries that no longer fit the memory budget are skipped.
    pub fn restore_entry(&mut self, key: String, value: Vec<u8>, compressed: bool, expires_at: u64) {
        let entry_size = estimate_size(&key, value.len());
        if entry_size > self.max_memory_bytes {
            warn!(key, "skipping snapshot entry larger than the memory limit");
            return;
        }

        let entry = CacheEntry::restored(value, compressed, expires_at, entry_size);
        if let Some(prev) = self.entries.insert(key.clone(), entry) {
            self.size_bytes = self.size_bytes.saturating_sub(prev.size_bytes);
        }
        self.size_bytes += entry_size;
        self.evict_until_within_limits(&key);
    }

    // == Accessors ==
    /// Returns the current number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the current estimated footprint in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Iterates over all entries, e.g. for a persistence snapshot.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.entries.iter()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    /// Evicts victims one at a time until both limits hold.
    ///
    /// The entry just written is shielded from selection so a `set` that
    /// succeeded cannot silently evict its own entry (fresh entries would
    /// otherwise be the LFU favourite), and so each round removes a
    /// different entry and the loop converges.
    fn evict_until_within_limits(&mut self, shielded_key: &str) {
        while self.entries.len() > self.max_entries || self.size_bytes > self.max_memory_bytes {
            let victim = self.policy.select_victim(
                self.entries
                    .iter()
                    .filter(|(key, _)| key.as_str() != shielded_key),
            );
            let Some(victim) = victim else {
                break;
            };

            if let Some(entry) = self.entries.remove(&victim) {
                self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes);
                self.stats.record_eviction();
                debug!(
                    key = victim.as_str(),
                    policy = self.policy.name(),
                    "evicted entry"
                );
            }
        }
    }

    /// Decompresses stored bytes when flagged; None means the bytes are bad.
    fn unpack(&self, raw: Vec<u8>, compressed: bool, key: &str) -> Option<Vec<u8>> {
        if !compressed {
            return Some(raw);
        }
        match self.compression.decompress(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "dropping entry with undecompressable value: {}", e);
                None
            }
        }
    }
}

/// Estimates an entry's memory footprint: key + stored value + fixed
/// per-entry overhead. Approximate on purpose; it only needs to shrink and
/// grow consistently so eviction converges.
fn estimate_size(key: &str, stored_len: usize) -> usize {
    key.len() + stored_len + ENTRY_OVERHEAD_BYTES
}

// == Glob Matching ==
/// Matches `text` against a pattern where `*` matches any run of
/// characters and everything else matches literally.
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text;

    let prefix = parts[0];
    if !rest.starts_with(prefix) {
        return false;
    }
    rest = &rest[prefix.len()..];

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(parts[parts.len() - 1])
}
