//! Eviction Policy Module
//!
//! Selects victims when the store exceeds its entry-count or memory limits.
//!
//! All three policies scan entry metadata rather than maintaining a side
//! structure, trading strict ordering for simplicity; ties are broken
//! deterministically so eviction never depends on map iteration order.

use crate::cache::CacheEntry;

// == Eviction Policy ==
/// Victim-selection policy, chosen at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict the entry with the oldest `last_accessed_at`
    Lru,
    /// Evict the entry with the lowest `access_count`
    /// (ties broken by oldest `last_accessed_at`)
    Lfu,
    /// Evict the entry with the oldest `created_at`
    Fifo,
}

impl EvictionPolicy {
    /// Parses a policy name as used in configuration.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lru" => Some(Self::Lru),
            "lfu" => Some(Self::Lfu),
            "fifo" => Some(Self::Fifo),
            _ => None,
        }
    }

    /// Returns the configuration name of the policy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
        }
    }

    // == Select Victim ==
    /// Picks the entry to evict among `candidates`.
    ///
    /// Final ties always break on the lexicographically smallest key so the
    /// choice is fully deterministic.
    ///
    /// Returns None if there are no candidates.
    pub fn select_victim<'a, I>(&self, candidates: I) -> Option<String>
    where
        I: Iterator<Item = (&'a String, &'a CacheEntry)>,
    {
        let victim = match self {
            Self::Lru => candidates.min_by(|(ka, a), (kb, b)| {
                (a.last_accessed_at, *ka).cmp(&(b.last_accessed_at, *kb))
            }),
            Self::Lfu => candidates.min_by(|(ka, a), (kb, b)| {
                (a.access_count, a.last_accessed_at, *ka).cmp(&(
                    b.access_count,
                    b.last_accessed_at,
                    *kb,
                ))
            }),
            Self::Fifo => candidates
                .min_by(|(ka, a), (kb, b)| (a.created_at, *ka).cmp(&(b.created_at, *kb))),
        };

        victim.map(|(key, _)| key.clone())
    }
}
