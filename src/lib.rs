//! User Cache Gateway - fetch-through cache with backpressure
//!
//! Sits in front of a slow user store: an expiring LRU cache, a bounded
//! task queue that throttles upstream fetches, per-key request
//! deduplication, and a dual-window rate limiter on the way in.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod models;
pub mod queue;
pub mod service;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::{AppError, Result};
pub use limiter::{Admission, RateLimiter};
pub use service::LookupCoordinator;
pub use tasks::{spawn_cleanup_task, spawn_rate_limit_cleanup_task};
