//! Cache Module
//!
//! In-memory LRU cache with per-entry TTL expiration and live statistics.

mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::LruList;
pub use stats::CacheStats;
pub use store::CacheStore;
