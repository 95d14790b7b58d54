//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by every part of the engine:
//! - Dynamic values (`Value`, `Record`)
//! - Lookup keys (`Conditions`, `Verb`)
//! - The aggregated validation failure (`ValidationFailure`)
//! - Error types (`TrellisError`)
//!
//! ## Determinism Guarantees
//!
//! - `Conditions` is a `BTreeMap`, so cache keys compare structurally and
//!   iterate in a stable order
//! - `Record` preserves insertion order, so documents follow descriptor order

mod value;

pub use value::{Record, Value};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// CONDITIONS
// =============================================================================

/// Condition name to scalar value. Tags use the same shape.
pub type Conditions = BTreeMap<String, Value>;

/// Build the cache lookup key `conditions ∪ tags`. Tags win on collision.
#[must_use]
pub fn merge_conditions(conditions: &Conditions, tags: &Conditions) -> Conditions {
    let mut key = conditions.clone();
    key.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    key
}

// =============================================================================
// VERB
// =============================================================================

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Resources can only be created for GET and POST.
    #[must_use]
    pub const fn is_resource_verb(self) -> bool {
        matches!(self, Self::Get | Self::Post)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(TrellisError::MethodNotAllowed(format!("{} not allowed.", s))),
        }
    }
}

// =============================================================================
// VALIDATION FAILURE
// =============================================================================

/// All validation messages collected during one call.
///
/// Messages are path-qualified (`items[2].name`) and kept in the order the
/// fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Class identity of the resource that rejected the input.
    pub resource: String,
    pub messages: Vec<String>,
}

impl ValidationFailure {
    #[must_use]
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            messages: Vec::new(),
        }
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    #[must_use]
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.messages.join("; "))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while resolving, validating or rendering a resource.
///
/// - `BadRequest` is the only user-facing recoverable failure; it always
///   carries every message of the call
/// - Everything else aborts the call before a document is produced
#[derive(Debug, Error)]
pub enum TrellisError {
    /// Submitted values failed validation.
    #[error("Bad request: {0}")]
    BadRequest(ValidationFailure),

    /// The root, resource or attached resource cannot be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The verb cannot be used to create or call this resource.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A resolved variant declares a status the engine cannot produce.
    #[error("[{class}] Unsupported status code {status}")]
    UnsupportedVariantStatus { class: String, status: u16 },

    /// A state or private field was about to be exposed to the client.
    #[error("Illegal field visibility: {0}")]
    IllegalFieldVisibility(String),

    /// A definition was rejected while loading.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// Unknown scalar kind, unregistered class, or similar wiring error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal server error raised by the engine itself.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The application handler failed.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Shared store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrellisError {
    /// The HTTP status a transport should answer with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            _ => 500,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
