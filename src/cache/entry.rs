//! Cache Entry Module
//!
//! Defines the arena node that holds a cached value, its expiry and its
//! position in the recency list.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A single cached value plus its links in the recency list.
///
/// `prev` and `next` are slot indices into the owning store's arena, so the
/// entry never holds a reference to its neighbours. They are only meaningful
/// to the store that created the entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key under which the entry is indexed
    pub key: String,
    /// The stored value
    pub value: V,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a detached entry that expires `ttl_ms` after `now`.
    pub fn new(key: String, value: V, ttl_ms: u64, now: u64) -> Self {
        Self {
            key,
            value,
            expires_at: now.saturating_add(ttl_ms),
            prev: None,
            next: None,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry is past its expiry at `now`.
    ///
    /// An entry is live up to and including its `expires_at` instant; it only
    /// counts as expired once the clock has moved strictly past it.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Checks expiry against the wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as 0 rather than panicking.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
