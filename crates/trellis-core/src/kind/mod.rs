//! # Type Registry
//!
//! A field's type is one of:
//! - a scalar kind, looked up by name in the `TypeRegistry`
//! - an object, described by a nested descriptor table
//! - a tuple, described by a nested descriptor table read positionally
//!
//! Scalar kinds validate by returning the normalized value, or `None` when
//! the value is invalid. They never fail any other way, so one bad leaf in a
//! deeply nested submission does not stop the others from being checked.

mod builtin;
mod html;
mod template;

pub use builtin::{
    BooleanKind, DateKind, EmailKind, IntegerKind, NumberKind, StringKind, TextKind, UrlKind,
};
pub use html::HtmlKind;
pub use template::{UriTemplateKind, expand_template};

use crate::schema::{Schema, TableId, TypeRef};
use crate::{Record, TrellisError, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// SCALAR KIND
// =============================================================================

/// A named scalar type.
pub trait ScalarKind: Send + Sync + fmt::Debug {
    /// Registry key and default `type` metadata.
    fn name(&self) -> &str;

    /// Check a submitted value. `Some` carries the normalized value.
    fn validate(&self, value: &Value) -> Option<Value>;

    /// Write type metadata onto a field schema record.
    ///
    /// `state` holds the state values accumulated for the response so far.
    fn emit_meta(&self, target: &mut Record, state: &Record) {
        let _ = state;
        target.insert("type".to_string(), Value::from(self.name()));
    }
}

// =============================================================================
// FIELD TYPE
// =============================================================================

/// A resolved type reference.
#[derive(Debug, Clone, Copy)]
pub enum FieldType<'a> {
    Scalar(&'a dyn ScalarKind),
    Object(TableId),
    Tuple(TableId),
}

impl FieldType<'_> {
    pub fn emit_meta(&self, target: &mut Record, state: &Record) {
        match self {
            Self::Scalar(kind) => kind.emit_meta(target, state),
            Self::Object(_) => {
                target.insert("type".to_string(), Value::from("object"));
            }
            Self::Tuple(_) => {
                target.insert("type".to_string(), Value::from("tuple"));
            }
        }
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Scalar kinds by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    kinds: BTreeMap<String, Arc<dyn ScalarKind>>,
}

impl TypeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every builtin kind.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(StringKind)
            .register(TextKind)
            .register(IntegerKind)
            .register(NumberKind)
            .register(BooleanKind)
            .register(EmailKind)
            .register(UrlKind)
            .register(DateKind)
            .register(HtmlKind);
        registry
    }

    /// Add or replace a kind under its own name.
    pub fn register<K: ScalarKind + 'static>(&mut self, kind: K) -> &mut Self {
        self.kinds.insert(kind.name().to_string(), Arc::new(kind));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn ScalarKind> {
        self.kinds.get(name).map(|k| k.as_ref())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Registered kind names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Resolve a type reference. Unknown scalar names are a wiring error.
    pub fn resolve<'a>(&'a self, type_ref: &TypeRef) -> Result<FieldType<'a>, TrellisError> {
        match type_ref {
            TypeRef::Scalar(name) => self.get(name).map(FieldType::Scalar).ok_or_else(|| {
                TrellisError::Configuration(format!("Unknown field type '{}'", name))
            }),
            TypeRef::Object(id) => Ok(FieldType::Object(*id)),
            TypeRef::Tuple(id) => Ok(FieldType::Tuple(*id)),
        }
    }

    /// Check that every scalar kind used anywhere in the schema is registered.
    pub fn verify_schema(&self, schema: &Schema) -> Result<(), TrellisError> {
        for (_, fields) in schema.tables() {
            for field in fields {
                if let TypeRef::Scalar(name) = &field.type_ref {
                    if !self.contains(name) {
                        return Err(TrellisError::Configuration(format!(
                            "Field '{}' uses unknown type '{}'",
                            field.name, name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
