//! Error types for the cache gateway
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ErrorResponse;

// == App Error Enum ==
/// Unified error type for the gateway.
///
/// `Clone` so that a single failed upstream fetch can be handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Requested key is absent upstream
    #[error("{0}")]
    NotFound(String),

    /// Admission denied by the rate limiter
    #[error("{message}")]
    RateLimited {
        retry_after_secs: u64,
        message: String,
    },

    /// Any other failure raised while fetching from upstream
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Invalid request data
    #[error("{0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn user_not_found(id: u64) -> Self {
        AppError::NotFound(format!("User with ID {} not found", id))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match self {
            AppError::RateLimited {
                retry_after_secs,
                message,
            } => {
                let body = Json(json!({
                    "error": "Too many requests",
                    "message": message,
                    "retryAfter": retry_after_secs,
                }));
                let mut response = (status, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            other => (status, Json(ErrorResponse::new(other.to_string()))).into_response(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the gateway.
pub type Result<T> = std::result::Result<T, AppError>;
