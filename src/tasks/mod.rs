//! Background Tasks Module
//!
//! Periodic sweeps that run alongside request handling.
//!
//! # Tasks
//! - Cache cleanup: removes expired cache entries
//! - Rate limit cleanup: forgets clients whose windows have elapsed

mod cleanup;
mod rate_limit_cleanup;

pub use cleanup::spawn_cleanup_task;
pub use rate_limit_cleanup::spawn_rate_limit_cleanup_task;
