//! Admission Limiter
//!
//! Per-client dual-window request counting: a sustained window with a
//! larger cap and a shorter burst window with a smaller cap.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use dashmap::DashMap;
use tracing::debug;

use crate::cache::current_timestamp_ms;
use crate::error::{AppError, Result};

/// Identity shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";

// == Config ==
/// Window widths in milliseconds and their request caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    pub burst_window_ms: u64,
    pub burst_max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
            burst_window_ms: 10_000,
            burst_max_requests: 5,
        }
    }
}

/// Which window rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    Burst,
    Sustained,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied {
        retry_after_secs: u64,
        scope: LimitScope,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    /// Converts a denial into `AppError::RateLimited`.
    pub fn into_result(self) -> Result<()> {
        match self {
            Admission::Allowed => Ok(()),
            Admission::Denied {
                retry_after_secs,
                scope,
            } => {
                let message = match scope {
                    LimitScope::Burst => {
                        "Rate limit exceeded. Burst capacity reached. Please try again later."
                    }
                    LimitScope::Sustained => {
                        "Rate limit exceeded. Maximum requests per minute reached. Please try again later."
                    }
                };
                Err(AppError::RateLimited {
                    retry_after_secs,
                    message: message.to_string(),
                })
            }
        }
    }
}

/// Counters for one client. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Copy)]
struct RateLimitInfo {
    window_start: u64,
    count: u32,
    burst_start: u64,
    burst_count: u32,
}

impl RateLimitInfo {
    fn new(now: u64) -> Self {
        Self {
            window_start: now,
            count: 0,
            burst_start: now,
            burst_count: 0,
        }
    }
}

// == Rate Limiter ==
/// Per-client dual-window admission gate.
///
/// A request is admitted only while both the burst and the sustained
/// counters are under their caps; admission bumps both. The burst window is
/// always checked first, so a client over both caps is told when the burst
/// window resets.
#[derive(Debug)]
pub struct RateLimiter {
    clients: DashMap<String, RateLimitInfo>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            clients: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    // == Admit ==
    /// Checks and records one request from `client` against the wall clock.
    pub fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, current_timestamp_ms())
    }

    pub fn admit_at(&self, client: &str, now: u64) -> Admission {
        let cfg = &self.config;
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| RateLimitInfo::new(now));
        let info = entry.value_mut();

        if now.saturating_sub(info.window_start) > cfg.window_ms {
            info.window_start = now;
            info.count = 0;
        }
        if now.saturating_sub(info.burst_start) > cfg.burst_window_ms {
            info.burst_start = now;
            info.burst_count = 0;
        }

        if info.burst_count >= cfg.burst_max_requests {
            let retry_after_secs = retry_after(cfg.burst_window_ms, info.burst_start, now);
            debug!(client, retry_after_secs, "burst limit reached");
            return Admission::Denied {
                retry_after_secs,
                scope: LimitScope::Burst,
            };
        }

        if info.count >= cfg.max_requests {
            let retry_after_secs = retry_after(cfg.window_ms, info.window_start, now);
            debug!(client, retry_after_secs, "sustained limit reached");
            return Admission::Denied {
                retry_after_secs,
                scope: LimitScope::Sustained,
            };
        }

        info.count += 1;
        info.burst_count += 1;
        Admission::Allowed
    }

    // == Cleanup ==
    /// Drops clients whose burst and sustained windows have both elapsed.
    ///
    /// Returns the number of clients removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(current_timestamp_ms())
    }

    pub fn cleanup_expired_at(&self, now: u64) -> usize {
        let before = self.clients.len();
        let cfg = self.config;
        self.clients.retain(|_, info| {
            let window_over = now.saturating_sub(info.window_start) > cfg.window_ms;
            let burst_over = now.saturating_sub(info.burst_start) > cfg.burst_window_ms;
            !(window_over && burst_over)
        });
        before.saturating_sub(self.clients.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Whole seconds until a window of `width_ms` opened at `start` resets,
/// never less than one.
fn retry_after(width_ms: u64, start: u64, now: u64) -> u64 {
    let remaining = width_ms.saturating_sub(now.saturating_sub(start));
    remaining.div_ceil(1000).max(1)
}

// == Client Identity ==
/// Identity used to bucket a request.
///
/// First address in `X-Forwarded-For`, else the peer address, else
/// [`UNKNOWN_CLIENT`].
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}
