//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::limiter::RateLimitConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
/// Durations are given in milliseconds.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries the cache can hold
    pub cache_max_entries: usize,
    /// Default TTL for cached users
    pub cache_ttl_ms: u64,
    /// Interval between expired-entry sweeps
    pub cache_cleanup_interval_ms: u64,
    /// Sustained window width
    pub rate_limit_window_ms: u64,
    /// Requests allowed per sustained window
    pub rate_limit_max_requests: u32,
    /// Burst window width
    pub rate_limit_burst_window_ms: u64,
    /// Requests allowed per burst window
    pub rate_limit_burst_max_requests: u32,
    /// Interval between idle-client sweeps
    pub rate_limit_cleanup_interval_ms: u64,
    /// Maximum concurrent upstream fetches
    pub queue_concurrency: usize,
    /// Simulated upstream latency per fetch
    pub queue_delay_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 100)
    /// - `CACHE_TTL_MS` - Default TTL (default: 60000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Cache sweep frequency (default: 10000)
    /// - `RATE_LIMIT_WINDOW_MS` - Sustained window (default: 60000)
    /// - `RATE_LIMIT_MAX_REQUESTS` - Sustained cap (default: 10)
    /// - `RATE_LIMIT_BURST_WINDOW_MS` - Burst window (default: 10000)
    /// - `RATE_LIMIT_BURST_MAX_REQUESTS` - Burst cap (default: 5)
    /// - `RATE_LIMIT_CLEANUP_INTERVAL_MS` - Limiter sweep frequency (default: 60000)
    /// - `QUEUE_CONCURRENCY` - Upstream concurrency (default: 3)
    /// - `QUEUE_DELAY_MS` - Simulated upstream latency (default: 200)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl_ms: env_or("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cache_cleanup_interval_ms: env_or(
                "CACHE_CLEANUP_INTERVAL_MS",
                defaults.cache_cleanup_interval_ms,
            ),
            rate_limit_window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms),
            rate_limit_max_requests: env_or(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_burst_window_ms: env_or(
                "RATE_LIMIT_BURST_WINDOW_MS",
                defaults.rate_limit_burst_window_ms,
            ),
            rate_limit_burst_max_requests: env_or(
                "RATE_LIMIT_BURST_MAX_REQUESTS",
                defaults.rate_limit_burst_max_requests,
            ),
            rate_limit_cleanup_interval_ms: env_or(
                "RATE_LIMIT_CLEANUP_INTERVAL_MS",
                defaults.rate_limit_cleanup_interval_ms,
            ),
            queue_concurrency: env_or("QUEUE_CONCURRENCY", defaults.queue_concurrency),
            queue_delay_ms: env_or("QUEUE_DELAY_MS", defaults.queue_delay_ms),
        }
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.rate_limit_window_ms,
            max_requests: self.rate_limit_max_requests,
            burst_window_ms: self.rate_limit_burst_window_ms,
            burst_max_requests: self.rate_limit_burst_max_requests,
        }
    }

    pub fn cache_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cache_cleanup_interval_ms)
    }

    pub fn rate_limit_cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cleanup_interval_ms)
    }

    pub fn queue_delay(&self) -> Duration {
        Duration::from_millis(self.queue_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_max_entries: 100,
            cache_ttl_ms: 60_000,
            cache_cleanup_interval_ms: 10_000,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 10,
            rate_limit_burst_window_ms: 10_000,
            rate_limit_burst_max_requests: 5,
            rate_limit_cleanup_interval_ms: 60_000,
            queue_concurrency: 3,
            queue_delay_ms: 200,
        }
    }
}

/// Parses `key` from the environment, falling back to `default` when unset
/// or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
