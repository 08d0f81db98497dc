//! API Handlers
//!
//! HTTP request handlers for each gateway endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::cache::{CacheStats, CacheStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::limiter::RateLimiter;
use crate::models::{CreateUserRequest, HealthResponse, MessageResponse, User};
use crate::service::LookupCoordinator;
use crate::store::MockUserStore;

/// Application state shared across all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Cache-first user lookups
    pub users: LookupCoordinator<MockUserStore>,
    /// Admission gate applied to every request
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(users: LookupCoordinator<MockUserStore>, limiter: Arc<RateLimiter>) -> Self {
        Self { users, limiter }
    }

    /// Builds the cache, store, coordinator and limiter from configuration.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let cache = CacheStore::new(config.cache_max_entries, config.cache_ttl_ms);
        let users = LookupCoordinator::new(
            Arc::new(MockUserStore::new()),
            Arc::new(tokio::sync::RwLock::new(cache)),
            config.queue_concurrency,
            config.queue_delay(),
        );
        let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
        Self::new(users, limiter)
    }
}

/// Handler for GET /users/:id
pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let id: u64 = id
        .parse()
        .map_err(|_| AppError::InvalidRequest("Invalid user ID".to_string()))?;

    let user = state.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Handler for POST /users
pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let new_user = req.validate().map_err(AppError::InvalidRequest)?;

    let user = state.users.create(new_user).await;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler for GET /cache-status
pub async fn cache_status_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.users.cache_stats().await)
}

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.users.clear_cache().await;
    Json(MessageResponse::new("Cache cleared successfully"))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
