//! Negative Cache Module
//!
//! Remembers keys confirmed absent upstream (e.g. a 404) for a short
//! window, so repeated lookups for a missing key do not keep hitting the
//! slow upstream. "Not found" can become "found" quickly, so the TTL here
//! is deliberately short and independent of positive-entry TTLs.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::entry::current_timestamp_ms;

// == Negative Cache ==
/// Short-TTL tracker for "confirmed absent" keys.
#[derive(Debug)]
pub struct NegativeCache {
    /// Key -> timestamp the absence was recorded (Unix milliseconds)
    recorded: HashMap<String, u64>,
    /// How long an absence record stays valid
    ttl_ms: u64,
}

impl NegativeCache {
    // == Constructor ==
    /// Creates a tracker whose records expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            recorded: HashMap::new(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    // == Record Absent ==
    /// Records that `key` was confirmed absent upstream.
    pub fn record_absent(&mut self, key: &str) {
        self.recorded
            .insert(key.to_string(), current_timestamp_ms());
    }

    // == Is Recorded Absent ==
    /// Checks whether `key` has a live absence record.
    ///
    /// Expired records are removed lazily on lookup.
    pub fn is_recorded_absent(&mut self, key: &str) -> bool {
        match self.recorded.get(key) {
            Some(&recorded_at) => {
                if current_timestamp_ms() >= recorded_at + self.ttl_ms {
                    self.recorded.remove(key);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    // == Forget ==
    /// Drops the absence record for `key`, if any.
    ///
    /// Called when a value is successfully stored for the key.
    pub fn forget(&mut self, key: &str) {
        self.recorded.remove(key);
    }

    // == Purge Expired ==
    /// Removes all expired absence records; returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let ttl_ms = self.ttl_ms;
        let before = self.recorded.len();
        self.recorded
            .retain(|_, &mut recorded_at| now < recorded_at + ttl_ms);
        before - self.recorded.len()
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.recorded.clear();
    }

    /// Returns the number of live or stale records currently held.
    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_record_and_check() {
        let mut negative = NegativeCache::new(Duration::from_secs(5));

        assert!(!negative.is_recorded_absent("missing"));
        negative.record_absent("missing");
        assert!(negative.is_recorded_absent("missing"));
    }

    #[test]
    fn test_records_expire() {
        let mut negative = NegativeCache::new(Duration::from_millis(30));

        negative.record_absent("gone");
        assert!(negative.is_recorded_absent("gone"));

        sleep(Duration::from_millis(60));
        assert!(!negative.is_recorded_absent("gone"));
        // Lazy removal on lookup
        assert_eq!(negative.len(), 0);
    }

    #[test]
    fn test_forget_clears_record() {
        let mut negative = NegativeCache::new(Duration::from_secs(5));

        negative.record_absent("key");
        negative.forget("key");
        assert!(!negative.is_recorded_absent("key"));
    }

    #[test]
    fn test_purge_expired() {
        let mut negative = NegativeCache::new(Duration::from_millis(30));

        negative.record_absent("a");
        negative.record_absent("b");
        sleep(Duration::from_millis(60));
        negative.record_absent("c");

        assert_eq!(negative.purge_expired(), 2);
        assert_eq!(negative.len(), 1);
        assert!(negative.is_recorded_absent("c"));
    }

    #[test]
    fn test_clear() {
        let mut negative = NegativeCache::new(Duration::from_secs(5));
        negative.record_absent("a");
        negative.record_absent("b");

        negative.clear();
        assert!(negative.is_empty());
    }
}
