//! API Routes
//!
//! Configures the Axum router with all gateway endpoints.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_status_handler, clear_cache_handler, create_user_handler, get_user_handler,
    health_handler, AppState,
};
use super::middleware::{rate_limit_middleware, response_time_middleware};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /users/:id` - Fetch a user through the cache
/// - `POST /users` - Create a user (write-through)
/// - `GET /cache-status` - Cache statistics
/// - `DELETE /cache` - Clear the cache
/// - `GET /health` - Health check endpoint
///
/// # Middleware (outermost first)
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
/// - Response time: feeds the cache statistics
/// - Rate limiting: per-client burst and sustained windows
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/users/:id", get(get_user_handler))
        .route("/users", post(create_user_handler))
        .route("/cache-status", get(cache_status_handler))
        .route("/cache", delete(clear_cache_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            response_time_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
