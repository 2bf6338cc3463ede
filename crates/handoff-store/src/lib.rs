//! Handoff Store Library
//!
//! In-memory, TTL-governed storage for sessions, their tombstones, downloadable
//! artifacts and transient scan-page buffers. Nothing survives a restart.

pub mod error;
pub mod session_store;
pub mod sweeper;
pub mod ttl_cache;

// Re-export commonly used types
pub use error::{StoreError, StoreResult};
pub use session_store::{SessionLookup, SessionStore, SweepStats, DEFAULT_TOMBSTONE_TTL};
pub use sweeper::StoreSweeper;
pub use ttl_cache::TtlCache;
