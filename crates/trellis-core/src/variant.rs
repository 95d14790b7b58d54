//! # Resource Variants
//!
//! A variant is one concrete form of a resource: the class that backs it,
//! its hints, its root descriptor table and the verbs it answers to. Several
//! variants may share a resource, distinguished by the conditions they
//! require (`when`).
//!
//! Variants are immutable once built and handed out as `Arc<Variant>` by the
//! definition cache.

use crate::response::Status;
use crate::schema::{FieldDescriptor, Schema, TableId};
use crate::{Conditions, TrellisError, Value, Verb};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// VERB SPEC
// =============================================================================

/// How a variant answers one verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbSpec {
    /// Handler method name passed to `ResourceObject::handle`.
    pub method: String,
    /// Declared status code. Only 200, 204 and 303 can be produced.
    pub status: u16,
    /// Whether an OK response carries the assembled document.
    pub fields: bool,
    /// Whether a main resource gets a `self` link.
    pub self_link: bool,
}

impl VerbSpec {
    /// An OK verb with fields and a self link.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            status: Status::Ok.code(),
            fields: true,
            self_link: true,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn without_fields(mut self) -> Self {
        self.fields = false;
        self
    }

    #[must_use]
    pub fn without_self_link(mut self) -> Self {
        self.self_link = false;
        self
    }

    /// The declared status, if the engine supports it.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        Status::from_code(self.status)
    }
}

// =============================================================================
// VARIANT DEFINITION
// =============================================================================

/// Unvalidated variant, as written by a definition loader.
#[derive(Debug, Clone)]
pub struct VariantDef {
    pub class: String,
    pub hints: Vec<String>,
    pub table: TableId,
    pub verbs: BTreeMap<Verb, VerbSpec>,
    pub when: Conditions,
}

impl VariantDef {
    pub fn new(class: impl Into<String>, table: TableId) -> Self {
        Self {
            class: class.into(),
            hints: Vec::new(),
            table,
            verbs: BTreeMap::new(),
            when: Conditions::new(),
        }
    }

    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    #[must_use]
    pub fn verb(mut self, verb: Verb, spec: VerbSpec) -> Self {
        self.verbs.insert(verb, spec);
        self
    }

    /// Require a condition for this variant to match.
    #[must_use]
    pub fn when(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.when.insert(name.into(), value.into());
        self
    }
}

// =============================================================================
// VARIANT
// =============================================================================

/// A resolved, immutable resource variant.
#[derive(Debug, Clone)]
pub struct Variant {
    class: String,
    hints: Vec<String>,
    table: TableId,
    verbs: BTreeMap<Verb, VerbSpec>,
    when: Conditions,
    schema: Arc<Schema>,
}

impl Variant {
    /// Validate a definition against the schema it refers to.
    pub fn new(schema: Arc<Schema>, def: VariantDef) -> Result<Self, TrellisError> {
        if def.class.trim().is_empty() {
            return Err(TrellisError::InvalidDefinition(
                "Variant has an empty class identity".to_string(),
            ));
        }
        if !schema.is_defined(def.table) {
            return Err(TrellisError::InvalidDefinition(format!(
                "Variant '{}' refers to undefined table {}",
                def.class,
                def.table.index()
            )));
        }
        if def.verbs.is_empty() {
            return Err(TrellisError::InvalidDefinition(format!(
                "Variant '{}' has no verbs",
                def.class
            )));
        }
        if let Some((name, _)) = def.when.iter().find(|(_, v)| !v.is_scalar() && !v.is_null()) {
            return Err(TrellisError::InvalidDefinition(format!(
                "Variant '{}' condition '{}' is not a scalar",
                def.class, name
            )));
        }
        Ok(Self {
            class: def.class,
            hints: def.hints,
            table: def.table,
            verbs: def.verbs,
            when: def.when,
            schema,
        })
    }

    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    #[must_use]
    pub fn table(&self) -> TableId {
        self.table
    }

    /// The root descriptor table.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        self.schema.table(self.table)
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn verb(&self, verb: Verb) -> Option<&VerbSpec> {
        self.verbs.get(&verb)
    }

    pub fn verbs(&self) -> impl Iterator<Item = (Verb, &VerbSpec)> {
        self.verbs.iter().map(|(verb, spec)| (*verb, spec))
    }

    /// Conditions this variant requires.
    #[must_use]
    pub fn when(&self) -> &Conditions {
        &self.when
    }

    /// Every required condition is present in `key` with the same value.
    #[must_use]
    pub fn matches(&self, key: &Conditions) -> bool {
        self.when.iter().all(|(name, value)| key.get(name) == Some(value))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_table() -> (Arc<Schema>, TableId) {
        let mut schema = Schema::new();
        let table = schema.add(vec![]).expect("table");
        (Arc::new(schema), table)
    }

    #[test]
    fn matches_requires_every_condition() {
        let (schema, table) = schema_with_table();
        let variant = Variant::new(
            schema,
            VariantDef::new("shop.BusinessAccount", table)
                .verb(Verb::Get, VerbSpec::new("show"))
                .when("kind", "business"),
        )
        .expect("variant");

        let mut key = Conditions::new();
        assert!(!variant.matches(&key));
        key.insert("kind".into(), Value::from("business"));
        key.insert("locale".into(), Value::from("nl"));
        assert!(variant.matches(&key));
        key.insert("kind".into(), Value::from("personal"));
        assert!(!variant.matches(&key));
    }

    #[test]
    fn verb_spec_status() {
        assert_eq!(VerbSpec::new("show").status(), Some(Status::Ok));
        assert_eq!(VerbSpec::new("save").with_status(303).status(), Some(Status::SeeOther));
        assert_eq!(VerbSpec::new("brew").with_status(418).status(), None);
    }

    #[test]
    fn rejects_variants_without_verbs() {
        let (schema, table) = schema_with_table();
        let result = Variant::new(schema, VariantDef::new("shop.Empty", table));
        assert!(matches!(result, Err(TrellisError::InvalidDefinition(_))));
    }

    #[test]
    fn rejects_undefined_tables() {
        let (schema, _) = schema_with_table();
        let mut other = Schema::new();
        other.reserve();
        let pending = other.reserve();
        let result = Variant::new(
            schema,
            VariantDef::new("shop.Missing", pending).verb(Verb::Get, VerbSpec::new("show")),
        );
        assert!(result.is_err());
    }
}
