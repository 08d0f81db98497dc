//! Lookup Coordinator
//!
//! Turns an expensive fetch-by-id into a cache-first, deduplicated,
//! queue-backed lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore};
use crate::error::{AppError, Result};
use crate::models::{NewUser, User};
use crate::queue::TaskQueue;
use crate::store::UserStore;

/// Outcome slot shared by every caller waiting on one fetch.
/// `None` until the fetch finishes, then set exactly once.
type FetchOutcome = Option<Result<User>>;

type InFlight = HashMap<u64, watch::Receiver<FetchOutcome>>;

/// Cache key for a user id.
pub fn cache_key(id: u64) -> String {
    format!("user:{}", id)
}

// == Lookup Coordinator ==
/// Cache-first user lookups with at most one upstream fetch per id.
///
/// Lock order is always in-flight registry, then cache. Holding the registry
/// lock while consulting or filling the cache means no caller can see an id
/// that is both cached and in flight.
pub struct LookupCoordinator<S> {
    cache: Arc<RwLock<CacheStore<User>>>,
    queue: Arc<TaskQueue<u64, User>>,
    store: Arc<S>,
    in_flight: Arc<Mutex<InFlight>>,
}

impl<S> Clone for LookupCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            queue: Arc::clone(&self.queue),
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<S: UserStore> LookupCoordinator<S> {
    // == Constructor ==
    /// Creates the coordinator and its task queue.
    ///
    /// Must be called from inside a tokio runtime; the queue spawns its
    /// workers immediately.
    ///
    /// # Arguments
    /// * `store` - Upstream user source
    /// * `cache` - Shared cache, also handed to the background sweep
    /// * `concurrency` - Maximum concurrent upstream fetches
    /// * `delay` - Simulated upstream latency per fetch
    pub fn new(
        store: Arc<S>,
        cache: Arc<RwLock<CacheStore<User>>>,
        concurrency: usize,
        delay: Duration,
    ) -> Self {
        let upstream = Arc::clone(&store);
        let queue = TaskQueue::new(
            move |id: u64| {
                let upstream = Arc::clone(&upstream);
                async move { upstream.fetch_by_id(id) }
            },
            concurrency,
            delay,
        );

        Self {
            cache,
            queue: Arc::new(queue),
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // == Get By Id ==
    /// Returns the user for `id`, from cache when possible.
    ///
    /// On a miss, callers for the same id share a single queued fetch and all
    /// receive its value or its error. The fetch runs in its own task, so it
    /// completes and fills the cache even if every caller stops waiting.
    pub async fn get_by_id(&self, id: u64) -> Result<User> {
        let mut outcome = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(user) = self.cache.write().await.get(&cache_key(id)) {
                debug!(id, "cache hit");
                return Ok(user);
            }

            match in_flight.get(&id) {
                Some(pending) => {
                    debug!(id, "joining in-flight fetch");
                    pending.clone()
                }
                None => {
                    debug!(id, "cache miss, starting upstream fetch");
                    let (publisher, pending) = watch::channel(None);
                    in_flight.insert(id, pending.clone());
                    self.spawn_fetch(id, publisher);
                    pending
                }
            }
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AppError::Internal(format!("fetch for user {} ended without a result", id)))?;

        let result = (*settled).clone();
        result.unwrap_or_else(|| Err(AppError::Internal("empty fetch outcome".to_string())))
    }

    fn spawn_fetch(&self, id: u64, publisher: watch::Sender<FetchOutcome>) {
        let this = self.clone();

        tokio::spawn(async move {
            // A panic in the store is caught here so the registration below
            // is always removed.
            let fetcher = this.clone();
            let result = match tokio::spawn(async move { fetcher.fetch_upstream(id).await }).await
            {
                Ok(result) => result,
                Err(e) => Err(AppError::Upstream(format!("fetch for user {} aborted: {}", id, e))),
            };

            {
                let mut in_flight = this.in_flight.lock().await;
                if let Ok(user) = &result {
                    this.cache.write().await.set(cache_key(id), user.clone(), None);
                }
                in_flight.remove(&id);
            }

            if let Err(e) = &result {
                warn!(id, error = %e, "upstream fetch failed");
            }
            publisher.send_replace(Some(result));
        });
    }

    async fn fetch_upstream(&self, id: u64) -> Result<User> {
        // Unknown ids fail fast without taking a queue slot
        if !self.store.exists(id) {
            return Err(AppError::user_not_found(id));
        }
        self.queue.enqueue(id).await
    }

    // == Create ==
    /// Writes a new user straight to the store and caches it (write-through).
    pub async fn create(&self, new_user: NewUser) -> User {
        let _in_flight = self.in_flight.lock().await;
        let user = self.store.create(new_user);
        self.cache
            .write()
            .await
            .set(cache_key(user.id), user.clone(), None);
        debug!(id = user.id, "user created and cached");
        user
    }

    // == Cache Operations ==
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Drops every cached user. Statistics counters are kept.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Feeds one measured request duration into the cache statistics.
    pub async fn record_response_time(&self, duration_ms: u64) {
        self.cache.write().await.record_response_time(duration_ms);
    }

    /// Number of ids with a fetch currently outstanding.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    pub fn cache(&self) -> Arc<RwLock<CacheStore<User>>> {
        Arc::clone(&self.cache)
    }

    pub fn queue(&self) -> &TaskQueue<u64, User> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockUserStore;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DELAY: Duration = Duration::from_millis(50);

    fn coordinator(store: Arc<MockUserStore>) -> LookupCoordinator<MockUserStore> {
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 60_000)));
        LookupCoordinator::new(store, cache, 3, DELAY)
    }

    /// Fails the first `failures` fetches with an upstream error.
    struct FlakyStore {
        inner: MockUserStore,
        failures: AtomicUsize,
    }

    impl UserStore for FlakyStore {
        fn fetch_by_id(&self, id: u64) -> Result<User> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(AppError::Upstream("database unavailable".to_string()));
            }
            self.inner.fetch_by_id(id)
        }

        fn exists(&self, id: u64) -> bool {
            self.inner.exists(id)
        }

        fn create(&self, new_user: NewUser) -> User {
            self.inner.create(new_user)
        }
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));

        let first = service.get_by_id(1).await.unwrap();
        let second = service.get_by_id(1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "John Doe");
        assert_eq!(store.fetch_count(), 1);

        let stats = service.cache_stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_fetch() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));

        let results = join_all((0..10).map(|_| service.get_by_id(2))).await;

        assert_eq!(store.fetch_count(), 1);
        let expected = User::new(2, "Jane Smith", "jane@example.com");
        for result in results {
            assert_eq!(result.unwrap(), expected);
        }
        assert_eq!(service.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found_and_leaves_no_trace() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));
        service.get_by_id(1).await.unwrap();
        let size_before = service.cache_stats().await.size;

        let results = join_all((0..3).map(|_| service.get_by_id(999))).await;

        for result in results {
            assert_eq!(result, Err(AppError::user_not_found(999)));
        }
        assert_eq!(service.cache_stats().await.size, size_before);
        assert_eq!(service.in_flight_count().await, 0);
        // Only the earlier lookup of id 1 reached the store
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_reaches_all_waiters_and_allows_retry() {
        let store = Arc::new(FlakyStore {
            inner: MockUserStore::new(),
            failures: AtomicUsize::new(1),
        });
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 60_000)));
        let service = LookupCoordinator::new(store, cache, 3, DELAY);

        let results = join_all((0..4).map(|_| service.get_by_id(3))).await;
        for result in results {
            assert!(matches!(result, Err(AppError::Upstream(_))));
        }
        assert_eq!(service.in_flight_count().await, 0);
        assert_eq!(service.cache_stats().await.size, 0);

        // Registration was cleared, so the next request fetches again
        let user = service.get_by_id(3).await.unwrap();
        assert_eq!(user.name, "Alice Johnson");
    }

    /// Panics on the first `exists` call, healthy afterwards.
    struct PanicsOnceStore {
        inner: MockUserStore,
        panicked: std::sync::atomic::AtomicBool,
    }

    impl UserStore for PanicsOnceStore {
        fn fetch_by_id(&self, id: u64) -> Result<User> {
            self.inner.fetch_by_id(id)
        }

        fn exists(&self, id: u64) -> bool {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("store connection reset");
            }
            self.inner.exists(id)
        }

        fn create(&self, new_user: NewUser) -> User {
            self.inner.create(new_user)
        }
    }

    #[tokio::test]
    async fn test_panicking_fetch_clears_registration() {
        let store = Arc::new(PanicsOnceStore {
            inner: MockUserStore::new(),
            panicked: std::sync::atomic::AtomicBool::new(false),
        });
        let cache = Arc::new(RwLock::new(CacheStore::new(100, 60_000)));
        let service = LookupCoordinator::new(store, cache, 3, DELAY);

        let first = service.get_by_id(1).await;
        assert!(matches!(first, Err(AppError::Upstream(_))), "got {:?}", first);
        assert_eq!(service.in_flight_count().await, 0);

        let user = service.get_by_id(1).await.unwrap();
        assert_eq!(user.name, "John Doe");
    }

    #[tokio::test]
    async fn test_fetch_completes_after_waiter_gives_up() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));

        let waiter = {
            let service = service.clone();
            tokio::spawn(async move { service.get_by_id(1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();

        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(service.cache_stats().await.size, 1);
        assert_eq!(service.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_is_write_through() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));

        let created = service
            .create(NewUser {
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
            })
            .await;
        let fetched = service.get_by_id(created.id).await.unwrap();

        assert_eq!(created, fetched);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(service.cache_stats().await.hits, 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let store = Arc::new(MockUserStore::new());
        let service = coordinator(Arc::clone(&store));

        service.get_by_id(1).await.unwrap();
        service.clear_cache().await;
        assert_eq!(service.cache_stats().await.size, 0);

        service.get_by_id(1).await.unwrap();
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_record_response_time() {
        let service = coordinator(Arc::new(MockUserStore::new()));

        service.record_response_time(10).await;
        service.record_response_time(15).await;

        let stats = service.cache_stats().await;
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.average_response_time, 12.5);
    }
}
