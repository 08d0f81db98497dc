//! Cache Store Module
//!
//! Main cache engine combining a key index with the arena LRU list and
//! per-entry TTL expiration.

use std::collections::HashMap;

use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, LruList};

// == Cache Store ==
/// Fixed-capacity LRU cache with per-entry TTL.
///
/// Every key in `index` maps to exactly one occupied slot in `lru`, and
/// `stats.size` always equals `index.len()`.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key -> arena slot
    index: HashMap<String, usize>,
    /// Recency order and entry storage
    lru: LruList<V>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// TTL in milliseconds for entries set without an explicit TTL
    default_ttl_ms: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with the given capacity and default TTL.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the cache can hold
    /// * `default_ttl_ms` - TTL in milliseconds used when `set` gets `None`
    pub fn new(max_entries: usize, default_ttl_ms: u64) -> Self {
        Self {
            index: HashMap::with_capacity(max_entries),
            lru: LruList::with_capacity(max_entries),
            stats: CacheStats::new(),
            max_entries,
            default_ttl_ms,
        }
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed on the spot and counted as misses. A hit
    /// makes the entry the most recently used.
    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, current_timestamp_ms())
    }

    pub fn get_at(&mut self, key: &str, now: u64) -> Option<V> {
        let Some(&idx) = self.index.get(key) else {
            self.stats.record_miss();
            return None;
        };

        if self.is_slot_expired(idx, now) {
            self.remove_slot(idx);
            self.stats.record_miss();
            debug!(key, "cache entry expired on access");
            return None;
        }

        self.lru.move_to_front(idx);
        self.stats.record_hit();
        self.lru.get(idx).map(|entry| entry.value.clone())
    }

    // == Set ==
    /// Stores a value, refreshing it in place if the key already exists.
    ///
    /// A new key at capacity first evicts the least recently used entry.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl_ms` - TTL in milliseconds (uses the default TTL if None)
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl_ms: Option<u64>) {
        self.set_at(key, value, ttl_ms, current_timestamp_ms());
    }

    pub fn set_at(&mut self, key: impl Into<String>, value: V, ttl_ms: Option<u64>, now: u64) {
        let key = key.into();
        let ttl_ms = ttl_ms.unwrap_or(self.default_ttl_ms);

        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = self.lru.get_mut(idx) {
                entry.value = value;
                entry.expires_at = now.saturating_add(ttl_ms);
            }
            self.lru.move_to_front(idx);
            return;
        }

        if self.max_entries == 0 {
            return;
        }

        if self.index.len() >= self.max_entries {
            self.evict_lru();
        }

        let idx = self
            .lru
            .push_front(CacheEntry::new(key.clone(), value, ttl_ms, now));
        self.index.insert(key, idx);
        self.stats.set_size(self.index.len());
    }

    // == Has ==
    /// Reports whether a live entry exists, without touching stats or recency.
    ///
    /// An expired entry found here is removed, same as with `get`.
    pub fn has(&mut self, key: &str) -> bool {
        self.has_at(key, current_timestamp_ms())
    }

    pub fn has_at(&mut self, key: &str, now: u64) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        if self.is_slot_expired(idx, now) {
            self.remove_slot(idx);
            return false;
        }
        true
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.index.get(key) {
            Some(&idx) => {
                self.remove_slot(idx);
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Drops all entries. Hit, miss and timing counters are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.lru.clear();
        self.stats.set_size(0);
    }

    // == Stats ==
    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.index.len());
        stats
    }

    /// Accumulates an externally measured response time.
    pub fn record_response_time(&mut self, duration_ms: u64) {
        self.stats.record_response_time(duration_ms);
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_expired_at(current_timestamp_ms())
    }

    pub fn cleanup_expired_at(&mut self, now: u64) -> usize {
        let expired: Vec<usize> = self
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(idx, _)| idx)
            .collect();

        let count = expired.len();
        for idx in expired {
            self.remove_slot(idx);
        }
        count
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn default_ttl_ms(&self) -> u64 {
        self.default_ttl_ms
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    pub(crate) fn keys_by_recency(&self) -> Vec<String> {
        self.lru.iter().map(|(_, entry)| entry.key.clone()).collect()
    }

    fn evict_lru(&mut self) {
        if let Some(idx) = self.lru.tail() {
            if let Some(key) = self.remove_slot(idx) {
                debug!(key = %key, "evicted least recently used entry");
            }
        }
    }

    fn is_slot_expired(&self, idx: usize, now: u64) -> bool {
        self.lru
            .get(idx)
            .map_or(true, |entry| entry.is_expired_at(now))
    }

    /// Unlinks a slot and drops its index entry, returning the key.
    fn remove_slot(&mut self, idx: usize) -> Option<String> {
        let entry = self.lru.remove(idx)?;
        self.index.remove(&entry.key);
        self.stats.set_size(self.index.len());
        Some(entry.key)
    }

    /// Verifies the index and the list describe the same set of entries.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.index.len(), self.lru.len(), "index/list size mismatch");
        assert_eq!(self.stats.size, self.index.len(), "stats size mismatch");

        let walked: Vec<(usize, String)> = self
            .lru
            .iter()
            .map(|(idx, entry)| (idx, entry.key.clone()))
            .collect();
        assert_eq!(walked.len(), self.lru.len(), "list walk length mismatch");

        for (idx, key) in walked {
            assert_eq!(self.index.get(&key), Some(&idx), "index points elsewhere for {key}");
        }
        assert!(self.index.len() <= self.max_entries, "capacity exceeded");
    }
}
