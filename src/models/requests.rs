//! Request DTOs for the gateway API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::models::NewUser;

/// Request body for POST /users
///
/// Both fields are optional at the wire level so a missing field becomes a
/// 400 with a readable message instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl CreateUserRequest {
    /// Validates the request and converts it into a `NewUser`.
    ///
    /// Returns an error message if either field is missing or blank.
    pub fn validate(self) -> Result<NewUser, String> {
        match (non_blank(self.name), non_blank(self.email)) {
            (Some(name), Some(email)) => Ok(NewUser { name, email }),
            _ => Err("Name and email are required".to_string()),
        }
    }
}

fn non_blank(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}
