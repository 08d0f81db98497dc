//! Rate Limit Cleanup Task
//!
//! Background task that forgets clients once both of their windows have
//! elapsed, independent of request traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::limiter::RateLimiter;

/// Spawns the periodic limiter sweep.
///
/// Abort the returned handle to stop it; dropping the last `Arc` to the
/// limiter afterwards releases the client table.
pub fn spawn_rate_limit_cleanup_task(limiter: Arc<RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting rate limit cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = limiter.cleanup_expired();
            if removed > 0 {
                info!(
                    removed,
                    remaining = limiter.tracked_clients(),
                    "Rate limit cleanup: dropped idle clients"
                );
            } else {
                debug!("Rate limit cleanup: no idle clients");
            }
        }
    })
}
