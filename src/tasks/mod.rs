//! Background Tasks Module
//!
//! Contains the cache's two background timers, started on construction and
//! aborted on `close()`.
//!
//! # Tasks
//! - Expired-entry sweep: removes expired entries and stale negative records
//! - Snapshot: periodically persists the store when persistence is enabled

mod snapshot;
mod sweep;

pub use snapshot::spawn_snapshot_task;
pub use sweep::spawn_sweep_task;
