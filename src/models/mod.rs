//! Data models for the gateway
//!
//! The `User` domain type plus the DTOs used for serializing and
//! deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;
pub mod user;

// Re-export commonly used types
pub use requests::CreateUserRequest;
pub use responses::{ErrorResponse, HealthResponse, MessageResponse};
pub use user::{NewUser, User};
