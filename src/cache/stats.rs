//! Cache Statistics Module
//!
//! Tracks hits, misses, live size and externally measured response times.

use serde::Serialize;

// == Cache Stats ==
/// Cumulative cache metrics.
///
/// Counters only grow; clearing the cache resets `size` but keeps the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent or expired)
    pub misses: u64,
    /// Current number of indexed entries
    pub size: usize,
    /// Sum of recorded response times in milliseconds
    pub total_response_time: u64,
    /// Number of recorded response times
    pub request_count: u64,
    /// `total_response_time / request_count`, rounded to 2 decimals
    pub average_response_time: f64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Response Time ==
    /// Adds one timing sample and refreshes the derived average.
    pub fn record_response_time(&mut self, duration_ms: u64) {
        self.total_response_time = self.total_response_time.saturating_add(duration_ms);
        self.request_count += 1;
        self.average_response_time =
            average_ms(self.total_response_time, self.request_count);
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}

/// Average in milliseconds rounded to two decimal places; 0 with no samples.
fn average_ms(total: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let avg = total as f64 / count as f64;
    (avg * 100.0).round() / 100.0
}
