//! Cache Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The sweep takes the same write lock as foreground cache operations, so
/// it never observes or leaves a half-updated cache.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(CacheStore::<User>::new(100, 60_000)));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(10));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: Arc<RwLock<CacheStore<V>>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        {
            let cache_guard = cache.read().await;
            info!(
                interval_ms = interval.as_millis() as u64,
                capacity = cache_guard.capacity(),
                default_ttl_ms = cache_guard.default_ttl_ms(),
                "Starting cache cleanup task"
            );
        }

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.cleanup_expired()
            };

            if removed > 0 {
                info!("Cache cleanup: removed {} expired entries", removed);
            } else {
                debug!("Cache cleanup: no expired entries found");
            }
        }
    })
}
