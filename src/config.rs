//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::EvictionPolicy;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Maximum estimated memory footprint in bytes
    pub max_memory_bytes: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Eviction policy used when the cache exceeds its limits
    pub eviction_policy: EvictionPolicy,
    /// Whether large values are transparently compressed
    pub compression_enabled: bool,
    /// Minimum value size in bytes before compression is attempted
    pub compression_threshold: usize,
    /// Whether per-key TTLs adapt to observed update frequency
    pub adaptive_ttl_enabled: bool,
    /// Lower bound in seconds for adaptive TTL suggestions
    pub adaptive_ttl_floor: u64,
    /// Upper bound in seconds for adaptive TTL suggestions
    pub adaptive_ttl_ceiling: u64,
    /// TTL in seconds for "confirmed absent" records
    pub negative_ttl: u64,
    /// Whether concurrent misses for the same key share one upstream fetch
    pub coalescing_enabled: bool,
    /// Background expired-entry sweep interval in seconds
    pub sweep_interval: u64,
    /// Whether snapshot persistence is enabled
    pub persistence_enabled: bool,
    /// Snapshot file path
    pub persistence_path: PathBuf,
    /// Background snapshot interval in seconds
    pub persistence_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10000)
    /// - `CACHE_MAX_MEMORY_BYTES` - Memory budget in bytes (default: 64 MiB)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_EVICTION_POLICY` - One of `lru`, `lfu`, `fifo` (default: lru)
    /// - `CACHE_COMPRESSION` - Enable compression (default: true)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Bytes (default: 10240)
    /// - `CACHE_ADAPTIVE_TTL` - Enable adaptive TTL (default: true)
    /// - `CACHE_NEGATIVE_TTL` - Negative-cache TTL in seconds (default: 5)
    /// - `CACHE_COALESCING` - Enable request coalescing (default: true)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep frequency in seconds (default: 30)
    /// - `CACHE_PERSISTENCE` - Enable snapshot persistence (default: false)
    /// - `CACHE_PERSISTENCE_PATH` - Snapshot file (default: cachefront.snapshot.json)
    /// - `CACHE_PERSISTENCE_INTERVAL` - Snapshot frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_env("CACHE_MAX_ENTRIES", defaults.max_entries),
            max_memory_bytes: parse_env("CACHE_MAX_MEMORY_BYTES", defaults.max_memory_bytes),
            default_ttl: parse_env("CACHE_DEFAULT_TTL", defaults.default_ttl),
            eviction_policy: env::var("CACHE_EVICTION_POLICY")
                .ok()
                .and_then(|v| EvictionPolicy::parse(&v))
                .unwrap_or(defaults.eviction_policy),
            compression_enabled: parse_env("CACHE_COMPRESSION", defaults.compression_enabled),
            compression_threshold: parse_env(
                "CACHE_COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            adaptive_ttl_enabled: parse_env("CACHE_ADAPTIVE_TTL", defaults.adaptive_ttl_enabled),
            adaptive_ttl_floor: defaults.adaptive_ttl_floor,
            adaptive_ttl_ceiling: defaults.adaptive_ttl_ceiling,
            negative_ttl: parse_env("CACHE_NEGATIVE_TTL", defaults.negative_ttl),
            coalescing_enabled: parse_env("CACHE_COALESCING", defaults.coalescing_enabled),
            sweep_interval: parse_env("CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            persistence_enabled: parse_env("CACHE_PERSISTENCE", defaults.persistence_enabled),
            persistence_path: env::var("CACHE_PERSISTENCE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.persistence_path),
            persistence_interval: parse_env(
                "CACHE_PERSISTENCE_INTERVAL",
                defaults.persistence_interval,
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_memory_bytes: 64 * 1024 * 1024,
            default_ttl: 300,
            eviction_policy: EvictionPolicy::Lru,
            compression_enabled: true,
            compression_threshold: 10 * 1024,
            adaptive_ttl_enabled: true,
            adaptive_ttl_floor: 5,
            adaptive_ttl_ceiling: 3600,
            negative_ttl: 5,
            coalescing_enabled: true,
            sweep_interval: 30,
            persistence_enabled: false,
            persistence_path: PathBuf::from("cachefront.snapshot.json"),
            persistence_interval: 60,
        }
    }
}

/// Reads an environment variable and parses it, falling back to a default.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.max_memory_bytes, 64 * 1024 * 1024);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(config.compression_enabled);
        assert_eq!(config.compression_threshold, 10 * 1024);
        assert_eq!(config.negative_ttl, 5);
        assert!(config.coalescing_enabled);
        assert!(!config.persistence_enabled);
    }

    // Defaults and the env override share one test: parallel tests must
    // not race on the process environment.
    #[test]
    fn test_config_from_env() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("CACHE_DEFAULT_TTL");
        env::remove_var("CACHE_EVICTION_POLICY");
        env::remove_var("CACHE_COMPRESSION");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.default_ttl, 300);
        assert_eq!(config.eviction_policy, EvictionPolicy::Lru);
        assert!(config.compression_enabled);

        env::set_var("CACHE_EVICTION_POLICY", "lfu");
        let config = Config::from_env();
        assert_eq!(config.eviction_policy, EvictionPolicy::Lfu);
        env::remove_var("CACHE_EVICTION_POLICY");
    }
}
