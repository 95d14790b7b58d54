//! # Collaborator Ports
//!
//! Traits for everything the engine consumes but does not own, together
//! with the reference implementations the engine ships:
//!
//! | Port | Implementations |
//! |---|---|
//! | `DefinitionCache` | `Catalog` |
//! | `SharedStore` | `MemoryStore`, `RedbStore` |
//! | `Translator` | `PlaceholderTranslator` |
//! | `Deserializer` | `TypedDeserializer` |
//! | `Journal` | `MemoryJournal`, `NullJournal` |
//!
//! All ports are `Send + Sync` so one `Engine` can serve concurrent calls.

use crate::variant::Variant;
use crate::{Conditions, FieldFlags, Record, TrellisError, Value};
use regex::{Captures, Regex};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

// =============================================================================
// DEFINITION CACHE
// =============================================================================

/// Resolves variants by unit, class and lookup key.
///
/// Must be deterministic for a given key.
pub trait DefinitionCache: Send + Sync {
    fn resolve_root(&self, unit: &str, conditions: &Conditions) -> Option<Arc<Variant>>;

    fn resolve(&self, unit: &str, class: &str, conditions: &Conditions) -> Option<Arc<Variant>>;
}

// =============================================================================
// SHARED STORE
// =============================================================================

/// Key-value store shared between resources, namespaced by pool.
///
/// Last write wins. No atomicity across keys.
pub trait SharedStore: Send + Sync {
    fn get(&self, pool: &str, key: &str) -> Result<Option<Value>, TrellisError>;

    /// `persistent` values survive the process, volatile values need not.
    fn set(&self, pool: &str, key: &str, value: &Value, persistent: bool) -> Result<(), TrellisError>;
}

// =============================================================================
// TRANSLATOR
// =============================================================================

pub trait Translator: Send + Sync {
    /// Translate `template`, substituting scalar `params`.
    fn translate(&self, template: &str, params: &Record) -> String;
}

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// Substitutes `{name}` placeholders with scalar parameters.
///
/// Unknown placeholders and non-scalar parameters are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTranslator;

impl Translator for PlaceholderTranslator {
    fn translate(&self, template: &str, params: &Record) -> String {
        let Some(placeholder) = PLACEHOLDER.as_ref() else {
            return template.to_string();
        };
        placeholder
            .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
                Some(value) if value.is_scalar() => value.to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}

// =============================================================================
// DESERIALIZER
// =============================================================================

/// How many values a field holds, as far as deserialization is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Array,
    Matrix,
}

impl Shape {
    #[must_use]
    pub const fn of(flags: FieldFlags) -> Self {
        if flags.is_array() {
            Self::Array
        } else if flags.is_matrix() {
            Self::Matrix
        } else {
            Self::Scalar
        }
    }
}

/// Converts raw (textual) values into typed values before validation.
pub trait Deserializer: Send + Sync {
    /// `None` means `raw` cannot represent a value of `type_name` in `shape`.
    fn deserialize(&self, type_name: &str, shape: Shape, raw: &Value) -> Option<Value>;
}

/// Deserializes query strings by type name and shape.
///
/// Strings for `integer` and `number` are parsed, strings for `object` and
/// `tuple` are read as JSON. Everything else passes through and is left to
/// the kind. Arrays are a JSON array or a comma separated list, matrices a
/// JSON array of arrays or rows separated by `;`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedDeserializer;

impl TypedDeserializer {
    fn scalar(type_name: &str, raw: &Value) -> Option<Value> {
        let Value::String(text) = raw else {
            return Some(raw.clone());
        };
        let text = text.trim();
        match type_name {
            "integer" => text.parse::<i64>().ok().map(Value::Int),
            "number" => text
                .parse::<i64>()
                .map(Value::Int)
                .ok()
                .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Float)),
            "object" | "tuple" => serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .map(Value::from),
            _ => Some(raw.clone()),
        }
    }

    fn list(type_name: &str, raw: &Value) -> Option<Value> {
        let items = match raw {
            Value::List(items) => items.clone(),
            Value::String(text) if text.trim_start().starts_with('[') => {
                match Value::from(serde_json::from_str::<serde_json::Value>(text).ok()?) {
                    Value::List(items) => items,
                    _ => return None,
                }
            }
            Value::String(text) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(Value::from)
                .collect(),
            _ => return None,
        };
        items
            .iter()
            .map(|item| Self::scalar(type_name, item))
            .collect::<Option<Vec<_>>>()
            .map(Value::List)
    }

    fn matrix(type_name: &str, raw: &Value) -> Option<Value> {
        let rows = match raw {
            Value::List(rows) => rows.clone(),
            Value::String(text) if text.trim_start().starts_with('[') => {
                match Value::from(serde_json::from_str::<serde_json::Value>(text).ok()?) {
                    Value::List(rows) => rows,
                    _ => return None,
                }
            }
            Value::String(text) => text
                .split(';')
                .filter(|row| !row.trim().is_empty())
                .map(Value::from)
                .collect(),
            _ => return None,
        };
        rows.iter()
            .map(|row| Self::list(type_name, row))
            .collect::<Option<Vec<_>>>()
            .map(Value::List)
    }
}

impl Deserializer for TypedDeserializer {
    fn deserialize(&self, type_name: &str, shape: Shape, raw: &Value) -> Option<Value> {
        match shape {
            Shape::Scalar => Self::scalar(type_name, raw),
            Shape::Array => Self::list(type_name, raw),
            Shape::Matrix => Self::matrix(type_name, raw),
        }
    }
}

// =============================================================================
// JOURNAL
// =============================================================================

/// One handler action, recorded by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Class identity of the resource.
    pub resource: String,
    /// Handler method that ran.
    pub action: String,
    pub status: u16,
    pub status_text: Option<String>,
    /// Redacted entries were valid once but have been superseded.
    pub redacted: bool,
}

impl JournalEntry {
    /// A new entry stamped with the current time.
    pub fn now(resource: impl Into<String>, action: impl Into<String>, status: u16) -> Self {
        let timestamp_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        Self {
            timestamp_ms,
            resource: resource.into(),
            action: action.into(),
            status,
            status_text: None,
            redacted: false,
        }
    }

    #[must_use]
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn redact(&mut self) {
        self.redacted = true;
    }
}

/// Audit sink handed to handlers. The engine never reads it.
pub trait Journal: Send + Sync {
    fn record(&self, entry: JournalEntry);
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullJournal;

impl Journal for NullJournal {
    fn record(&self, _entry: JournalEntry) {}
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl MemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in recording order.
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Redact every entry of `resource`.
    pub fn redact_resource(&self, resource: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut count = 0;
        for entry in entries.iter_mut().filter(|e| e.resource == resource && !e.redacted) {
            entry.redact();
            count += 1;
        }
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Journal for MemoryJournal {
    fn record(&self, entry: JournalEntry) {
        tracing::trace!(resource = %entry.resource, action = %entry.action, "journal entry");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_translation() {
        let mut params = Record::new();
        params.insert("name".into(), Value::from("Ada"));
        params.insert("count".into(), Value::Int(3));
        params.insert("tags".into(), Value::List(vec![]));

        let out = PlaceholderTranslator.translate("{name} has {count} items {tags} {missing}", &params);
        assert_eq!(out, "Ada has 3 items {tags} {missing}");
    }

    #[test]
    fn typed_deserializer() {
        let d = TypedDeserializer;
        let scalar = |t: &str, raw: Value| d.deserialize(t, Shape::Scalar, &raw);
        assert_eq!(scalar("integer", Value::from("12")), Some(Value::Int(12)));
        assert_eq!(scalar("integer", Value::from("x")), None);
        assert_eq!(scalar("number", Value::from("1.5")), Some(Value::Float(1.5)));
        assert_eq!(scalar("email", Value::from("a@b.com")), Some(Value::from("a@b.com")));
        assert_eq!(
            scalar("object", Value::from(r#"{"a":1}"#)),
            Some(Value::record([("a", Value::Int(1))]))
        );
        assert_eq!(scalar("integer", Value::Int(4)), Some(Value::Int(4)));
    }

    #[test]
    fn booleans_are_left_to_the_kind() {
        let d = TypedDeserializer;
        assert_eq!(d.deserialize("boolean", Shape::Scalar, &Value::from("on")), Some(Value::from("on")));
    }

    #[test]
    fn query_lists_and_matrices() {
        let d = TypedDeserializer;
        let ints = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(d.deserialize("integer", Shape::Array, &Value::from("1, 2")), Some(ints.clone()));
        assert_eq!(d.deserialize("integer", Shape::Array, &Value::from("[1,2]")), Some(ints.clone()));
        assert_eq!(d.deserialize("integer", Shape::Array, &Value::from("")), Some(Value::List(vec![])));
        assert_eq!(d.deserialize("integer", Shape::Array, &Value::from("1,x")), None);
        assert_eq!(d.deserialize("integer", Shape::Array, &Value::from(r#"{"a":1}"#)), None);

        let grid = Value::List(vec![ints.clone(), Value::List(vec![Value::Int(3)])]);
        assert_eq!(d.deserialize("integer", Shape::Matrix, &Value::from("1,2;3")), Some(grid.clone()));
        assert_eq!(d.deserialize("integer", Shape::Matrix, &Value::from("[[1,2],[3]]")), Some(grid));
    }

    #[test]
    fn journal_entries_are_stamped() {
        let before = Utc::now().timestamp_millis();
        let entry = JournalEntry::now("shop.Cart", "add", 200);
        assert!(entry.timestamp_ms >= u64::try_from(before).unwrap_or_default());
        assert!(!entry.redacted);
    }

    #[test]
    fn memory_journal_records_and_redacts() {
        let journal = MemoryJournal::new();
        journal.record(JournalEntry::now("shop.Contact", "send", 303));
        journal.record(JournalEntry::now("shop.Cart", "add", 200).with_status_text("OK"));
        assert_eq!(journal.len(), 2);
        assert_eq!(journal.redact_resource("shop.Contact"), 1);
        let entries = journal.entries();
        assert!(entries[0].redacted);
        assert!(!entries[1].redacted);
    }
}
