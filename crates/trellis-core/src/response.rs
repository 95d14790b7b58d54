//! # Responses
//!
//! `Response` is handed to the handler while a call is in progress. The
//! handler can redirect, add links, attach other resources, replace hints
//! and force field flags. Everything that needs the definition cache is
//! recorded as pending and resolved by the processor after the handler
//! returns.
//!
//! `Document` is the body of an OK response.

use crate::flags::FieldOverrides;
use crate::link::Link;
use crate::{Record, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// STATUS
// =============================================================================

/// The statuses a variant can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    NoContent,
    SeeOther,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::NoContent => 204,
            Self::SeeOther => 303,
        }
    }

    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(Self::Ok),
            204 => Some(Self::NoContent),
            303 => Some(Self::SeeOther),
            _ => None,
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NoContent => "No Content",
            Self::SeeOther => "See Other",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Hypermedia document of an OK response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Record>,
    #[serde(default)]
    pub fields: Vec<Record>,
    #[serde(default)]
    pub links: IndexMap<String, Link>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub embedded: IndexMap<String, Document>,
}

impl Document {
    /// Value of a data entry by name.
    #[must_use]
    pub fn data_value(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(name))
    }

    /// State value by name.
    #[must_use]
    pub fn state_value(&self, name: &str) -> Option<&Value> {
        self.state.as_ref().and_then(|state| state.get(name))
    }

    /// Field schema record by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Record> {
        self.fields
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
    }

    /// BLAKE3 hash of the JSON body, for use as an ETag.
    ///
    /// # Requires
    ///
    /// This function is only available with the `crypto-hash` feature enabled.
    #[cfg(feature = "crypto-hash")]
    pub fn etag(&self) -> Result<String, crate::TrellisError> {
        let body = serde_json::to_vec(self)
            .map_err(|e| crate::TrellisError::Serialization(e.to_string()))?;
        Ok(blake3::hash(&body).to_hex().to_string())
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

/// Link target recorded by a handler, resolved after it returns.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingLink {
    pub(crate) class: String,
    pub(crate) values: Record,
}

/// In-progress response of one call.
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    location: Option<String>,
    pending_location: Option<PendingLink>,
    pending_links: Vec<(String, PendingLink)>,
    attachments: Vec<(String, String)>,
    hints: Option<Vec<String>>,
    overrides: BTreeMap<String, FieldOverrides>,
    document: Option<Document>,
}

impl Response {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            location: None,
            pending_location: None,
            pending_links: Vec::new(),
            attachments: Vec::new(),
            hints: None,
            overrides: BTreeMap::new(),
            document: (status == Status::Ok).then(Document::default),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Redirect target of a See Other response.
    pub fn set_location(&mut self, class: impl Into<String>, values: Record) {
        self.pending_location = Some(PendingLink {
            class: class.into(),
            values,
        });
    }

    /// Add a link to another resource. Unresolvable links are dropped.
    pub fn link(&mut self, rel: impl Into<String>, class: impl Into<String>, values: Record) {
        self.pending_links.push((
            rel.into(),
            PendingLink {
                class: class.into(),
                values,
            },
        ));
    }

    /// Embed the document of another resource under `rel`.
    pub fn attach(&mut self, rel: impl Into<String>, class: impl Into<String>) {
        self.attachments.push((rel.into(), class.into()));
    }

    /// Replace the variant's hints.
    pub fn set_hints(&mut self, hints: Vec<String>) {
        self.hints = Some(hints);
    }

    /// Flag overrides for the field at `path` (`address.city`).
    pub fn field_overrides(&mut self, path: impl Into<String>) -> &mut FieldOverrides {
        self.overrides.entry(path.into()).or_default()
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    #[must_use]
    pub fn into_document(self) -> Option<Document> {
        self.document
    }

    pub(crate) fn overrides_for(&self, path: &str) -> FieldOverrides {
        self.overrides.get(path).copied().unwrap_or_default()
    }

    pub(crate) fn take_hints(&mut self) -> Option<Vec<String>> {
        self.hints.take()
    }

    pub(crate) fn take_pending_location(&mut self) -> Option<PendingLink> {
        self.pending_location.take()
    }

    pub(crate) fn take_pending_links(&mut self) -> Vec<(String, PendingLink)> {
        std::mem::take(&mut self.pending_links)
    }

    pub(crate) fn take_attachments(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.attachments)
    }

    pub(crate) fn resolve_location(&mut self, href: String) {
        self.location = Some(href);
    }

    pub(crate) fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }
}

// =============================================================================
// TESTS
// =============================================================================
