//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found (includes negative-cache hits and confirmed-absent loads)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A single entry cannot fit within the configured memory limit
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// The caller-supplied loader function failed
    #[error("Loader failed: {0}")]
    Loader(String),

    /// Deadline elapsed while waiting on an in-flight fetch
    #[error("Timed out waiting for fetch: {0}")]
    Timeout(String),

    /// Snapshot or restore failure (logged, never fatal)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The cache has been closed
    #[error("Cache is closed")]
    Closed,
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
