//! API Module
//!
//! HTTP handlers, middleware and routing for the gateway REST API.
//!
//! # Endpoints
//! - `GET /users/:id` - Fetch a user through the cache
//! - `POST /users` - Create a user
//! - `GET /cache-status` - Cache statistics
//! - `DELETE /cache` - Clear the cache
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
