//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// Represents a single cache entry with its value bytes and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value (possibly compressed)
    pub value: Vec<u8>,
    /// Whether `value` holds compressed bytes
    pub compressed: bool,
    /// Creation timestamp (Unix milliseconds), preserved across overwrites
    pub created_at: u64,
    /// Last access timestamp (Unix milliseconds)
    pub last_accessed_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Number of times the entry has been read
    pub access_count: u64,
    /// Estimated memory footprint in bytes (key + stored value + overhead)
    pub size_bytes: usize,
    /// Incremented on every overwrite of the same key
    pub version: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now.
    pub fn new(value: Vec<u8>, compressed: bool, ttl: Duration, size_bytes: usize) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            compressed,
            created_at: now,
            last_accessed_at: now,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
            access_count: 1,
            size_bytes,
            version: 1,
        }
    }

    /// Rebuilds an entry from a persisted snapshot record.
    ///
    /// The absolute expiry is carried over; access bookkeeping restarts.
    pub fn restored(value: Vec<u8>, compressed: bool, expires_at: u64, size_bytes: usize) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            compressed,
            created_at: now,
            last_accessed_at: now,
            expires_at,
            access_count: 1,
            size_bytes,
            version: 1,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is considered expired when the current time
    /// is greater than or equal to the expiration time, so the instant the TTL
    /// fully elapses the entry reads as a miss.
    pub fn is_expired(&self) -> bool {
        current_timestamp_ms() >= self.expires_at
    }

    // == Touch ==
    /// Records a read: bumps the access counter and refreshes recency.
    pub fn touch(&mut self) {
        self.last_accessed_at = current_timestamp_ms();
        self.access_count += 1;
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds (0 once expired).
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock reading before the epoch yields 0 rather than an error; entries
/// created under such skew simply expire immediately.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
