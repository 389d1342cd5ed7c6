//! Cachefront - an embeddable in-process cache
//!
//! Sits between a high-volume workload and a slow, rate-limited upstream:
//! absorbs repeated reads, coalesces concurrent fetches for the same key
//! into a single upstream call, bounds memory deterministically, and can
//! snapshot its contents to survive restarts without a cold start.
//!
//! # Example
//!
//! ```no_run
//! use cachefront::{Cache, Config, GetOrLoadOptions};
//!
//! # async fn example() -> cachefront::Result<()> {
//! let cache = Cache::new(Config::default()).await;
//!
//! let value = cache
//!     .get_or_load(
//!         "user:42",
//!         None,
//!         || async { Ok(Some(b"fetched from upstream".to_vec())) },
//!         GetOrLoadOptions::default(),
//!     )
//!     .await?;
//!
//! assert_eq!(value, b"fetched from upstream");
//! cache.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod persist;
pub mod tasks;

pub use cache::{CacheStats, EvictionPolicy};
pub use config::Config;
pub use engine::{Cache, GetOrLoadOptions};
pub use error::{CacheError, Result};
