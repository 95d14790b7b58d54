//! # API Request/Response Types
//!
//! JSON bodies the HTTP API produces besides resource documents.

use serde::{Deserialize, Serialize};
use trellis_core::TrellisError;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx/3xx answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Class identity that rejected the input (400 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Every validation message of the call (400 only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}

impl From<&TrellisError> for ErrorResponse {
    fn from(err: &TrellisError) -> Self {
        match err {
            TrellisError::BadRequest(failure) => Self {
                error: "Bad request".to_string(),
                resource: Some(failure.resource.clone()),
                messages: failure.messages.clone(),
            },
            TrellisError::NotFound(message) | TrellisError::MethodNotAllowed(message) => {
                Self::new(message.clone())
            }
            other => Self::new(other.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
