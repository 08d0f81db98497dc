//! Backing Store
//!
//! The slow upstream the gateway protects. `UserStore` is the contract the
//! coordinator consumes; `MockUserStore` is the in-memory stand-in for a
//! database that the server runs against.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::{NewUser, User};

// == User Store Trait ==
/// Upstream user source.
///
/// Calls are synchronous and assumed cheap; latency is modelled by the task
/// queue's delay, not by the store.
pub trait UserStore: Send + Sync + 'static {
    /// Returns the user or `AppError::NotFound`.
    fn fetch_by_id(&self, id: u64) -> Result<User>;

    fn exists(&self, id: u64) -> bool;

    /// Stores a new user under the next free id.
    fn create(&self, new_user: NewUser) -> User;
}

// == Mock User Store ==
/// Concurrent in-memory user table seeded with three users.
#[derive(Debug)]
pub struct MockUserStore {
    users: DashMap<u64, User>,
    next_id: AtomicU64,
    fetches: AtomicUsize,
}

impl MockUserStore {
    /// Creates a store holding the default seed users (ids 1-3).
    pub fn new() -> Self {
        Self::with_users(vec![
            User::new(1, "John Doe", "john@example.com"),
            User::new(2, "Jane Smith", "jane@example.com"),
            User::new(3, "Alice Johnson", "alice@example.com"),
        ])
    }

    /// Creates a store holding exactly `users`.
    pub fn with_users(users: Vec<User>) -> Self {
        let next_id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let table = DashMap::with_capacity(users.len());
        for user in users {
            table.insert(user.id, user);
        }

        Self {
            users: table,
            next_id: AtomicU64::new(next_id),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch_by_id` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for MockUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for MockUserStore {
    fn fetch_by_id(&self, id: u64) -> Result<User> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.users
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::user_not_found(id))
    }

    fn exists(&self, id: u64) -> bool {
        self.users.contains_key(&id)
    }

    fn create(&self, new_user: NewUser) -> User {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            name: new_user.name,
            email: new_user.email,
        };
        self.users.insert(id, user.clone());
        debug!(id, "user created in backing store");
        user
    }
}
