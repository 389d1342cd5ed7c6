//! Adaptive TTL Module
//!
//! Observes how often each key is rewritten and suggests per-key expiry:
//! keys that churn get a shorter TTL (down to a floor), stable keys get a
//! longer one (up to a ceiling). Purely advisory; an explicit caller TTL
//! always wins at the façade.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::entry::current_timestamp_ms;

// == Constants ==
/// Weight of the newest inter-update interval in the moving average.
const EWMA_ALPHA: f64 = 0.3;

/// Observations required before a suggestion deviates from the base TTL.
const MIN_OBSERVATIONS: u64 = 3;

/// Suggested TTL as a multiple of the average inter-update interval.
const INTERVAL_MULTIPLIER: f64 = 2.0;

/// Maximum number of keys tracked before the stalest is dropped.
const MAX_TRACKED_KEYS: usize = 100_000;

// == Key History ==
#[derive(Debug, Clone)]
struct KeyHistory {
    /// Timestamp of the most recent update (Unix milliseconds)
    last_update_at: u64,
    /// Exponentially weighted average of inter-update intervals (ms)
    ewma_interval_ms: f64,
    /// Total updates observed for the key
    observations: u64,
}

// == Adaptive TTL ==
/// Per-key update-frequency tracker with TTL suggestions.
#[derive(Debug)]
pub struct AdaptiveTtl {
    keys: HashMap<String, KeyHistory>,
    floor_ms: u64,
    ceiling_ms: u64,
}

impl AdaptiveTtl {
    // == Constructor ==
    /// Creates a controller whose suggestions are clamped to [floor, ceiling].
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            keys: HashMap::new(),
            floor_ms: floor.as_millis() as u64,
            ceiling_ms: ceiling.as_millis() as u64,
        }
    }

    // == Observe Update ==
    /// Records that `key` was written now, folding the inter-update interval
    /// into the moving average.
    pub fn observe_update(&mut self, key: &str) {
        let now = current_timestamp_ms();

        if let Some(history) = self.keys.get_mut(key) {
            let interval = now.saturating_sub(history.last_update_at) as f64;
            history.ewma_interval_ms = if history.observations == 1 {
                interval
            } else {
                EWMA_ALPHA * interval + (1.0 - EWMA_ALPHA) * history.ewma_interval_ms
            };
            history.last_update_at = now;
            history.observations += 1;
            return;
        }

        if self.keys.len() >= MAX_TRACKED_KEYS {
            self.drop_stalest();
        }
        self.keys.insert(
            key.to_string(),
            KeyHistory {
                last_update_at: now,
                ewma_interval_ms: 0.0,
                observations: 1,
            },
        );
    }

    // == Suggest TTL ==
    /// Suggests an expiry for `key`.
    ///
    /// Until enough updates have been observed the base TTL is returned
    /// unchanged. After that, the suggestion tracks twice the average
    /// inter-update interval: rapidly churning keys expire sooner than the
    /// base, long-stable keys later, clamped to the configured bounds.
    pub fn suggest_ttl(&self, key: &str, base: Duration) -> Duration {
        let Some(history) = self.keys.get(key) else {
            return base;
        };
        if history.observations < MIN_OBSERVATIONS {
            return base;
        }

        let suggested_ms = (history.ewma_interval_ms * INTERVAL_MULTIPLIER) as u64;
        Duration::from_millis(suggested_ms.clamp(self.floor_ms, self.ceiling_ms))
    }

    // == Forget ==
    /// Stops tracking `key` (entry deleted or evicted).
    pub fn forget(&mut self, key: &str) {
        self.keys.remove(key);
    }

    /// Drops all tracked history.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Number of keys currently tracked.
    #[allow(dead_code)]
    pub fn tracked_keys(&self) -> usize {
        self.keys.len()
    }

    /// Evicts the key with the oldest last update to bound the table.
    fn drop_stalest(&mut self) {
        let stalest = self
            .keys
            .iter()
            .min_by(|(ka, a), (kb, b)| {
                (a.last_update_at, ka.as_str()).cmp(&(b.last_update_at, kb.as_str()))
            })
            .map(|(key, _)| key.clone());
        if let Some(key) = stalest {
            self.keys.remove(&key);
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn controller() -> AdaptiveTtl {
        AdaptiveTtl::new(Duration::from_millis(10), Duration::from_secs(3600))
    }

    #[test]
    fn test_unknown_key_returns_base() {
        let adaptive = controller();
        let base = Duration::from_secs(300);
        assert_eq!(adaptive.suggest_ttl("never_seen", base), base);
    }

    #[test]
    fn test_few_observations_return_base() {
        let mut adaptive = controller();
        let base = Duration::from_secs(300);

        adaptive.observe_update("key");
        adaptive.observe_update("key");
        assert_eq!(adaptive.suggest_ttl("key", base), base);
    }

    #[test]
    fn test_frequent_updates_shorten_ttl() {
        let mut adaptive = controller();
        let base = Duration::from_secs(300);

        // Rapid rewrites: intervals of a few milliseconds
        for _ in 0..5 {
            adaptive.observe_update("hot");
            sleep(Duration::from_millis(5));
        }

        let suggested = adaptive.suggest_ttl("hot", base);
        assert!(
            suggested < base,
            "hot key should get shorter TTL, got {:?}",
            suggested
        );
        assert!(suggested >= Duration::from_millis(10), "floor must hold");
    }

    #[test]
    fn test_suggestion_respects_floor() {
        let mut adaptive = AdaptiveTtl::new(Duration::from_secs(2), Duration::from_secs(3600));

        for _ in 0..5 {
            adaptive.observe_update("churn");
        }

        // Near-zero intervals clamp up to the floor
        assert_eq!(
            adaptive.suggest_ttl("churn", Duration::from_secs(300)),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_suggestion_respects_ceiling() {
        let mut adaptive = AdaptiveTtl::new(Duration::from_millis(10), Duration::from_millis(500));

        adaptive.observe_update("stable");
        // Fake a long history without sleeping: backdate the last update
        let history = adaptive.keys.get_mut("stable").unwrap();
        history.ewma_interval_ms = 60_000.0;
        history.observations = 10;

        assert_eq!(
            adaptive.suggest_ttl("stable", Duration::from_secs(300)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_forget_and_clear() {
        let mut adaptive = controller();

        adaptive.observe_update("a");
        adaptive.observe_update("b");
        assert_eq!(adaptive.tracked_keys(), 2);

        adaptive.forget("a");
        assert_eq!(adaptive.tracked_keys(), 1);

        adaptive.clear();
        assert_eq!(adaptive.tracked_keys(), 0);
    }
}
