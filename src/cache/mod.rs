//! Cache Module
//!
//! The in-process caching engine: bounded entry storage with pluggable
//! eviction, TTL expiration, transparent compression, negative caching,
//! adaptive TTL and request coalescing.

mod adaptive;
mod coalesce;
mod compression;
mod entry;
mod eviction;
mod negative;
mod stats;
mod store;


// Re-export public types
pub use adaptive::AdaptiveTtl;
pub use coalesce::{FlightGroup, FlightOutcome, FlightResult};
pub use compression::Compression;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use eviction::EvictionPolicy;
pub use negative::NegativeCache;
pub use stats::{CacheStats, StatsRecorder};
pub use store::{EntryStore, Lookup};

// == Public Constants ==
/// Fixed per-entry overhead added to the key and value lengths when
/// estimating an entry's memory footprint.
pub const ENTRY_OVERHEAD_BYTES: usize = 120;
