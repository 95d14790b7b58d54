//! Field coercion.
//!
//! Every field of the root table is checked against its source of truth:
//!
//! | Placement | Source | Required |
//! |---|---|---|
//! | private | shared store when `shared`, else the default | never |
//! | meta, state | query, through the deserializer | when absent |
//! | data, plain | body, else the default | when absent on POST |
//!
//! Messages are collected into one `ValidationFailure` instead of stopping
//! at the first problem. Storage and configuration errors are fatal and
//! returned right away.

use crate::kind::{FieldType, TypeRegistry};
use crate::ports::{Deserializer, Shape, SharedStore};
use crate::primitives::MAX_NESTING_DEPTH;
use crate::schema::{FieldDescriptor, Schema};
use crate::{FieldFlags, Record, TrellisError, ValidationFailure, Value, Verb};

/// Coerces submitted values for one call.
pub struct Coercion<'a> {
    schema: &'a Schema,
    types: &'a TypeRegistry,
    deserializer: &'a dyn Deserializer,
    store: &'a dyn SharedStore,
    verb: Verb,
    failure: ValidationFailure,
}

impl<'a> Coercion<'a> {
    pub fn new(
        schema: &'a Schema,
        types: &'a TypeRegistry,
        deserializer: &'a dyn Deserializer,
        store: &'a dyn SharedStore,
        verb: Verb,
        resource: &str,
    ) -> Self {
        Self {
            schema,
            types,
            deserializer,
            store,
            verb,
            failure: ValidationFailure::new(resource),
        }
    }

    /// Check every field of a root table.
    ///
    /// Returns the coerced values in table order, or `BadRequest` with every
    /// message when anything was rejected.
    pub fn check_table(
        mut self,
        fields: &[FieldDescriptor],
        body: &Record,
        query: &Record,
    ) -> Result<Record, TrellisError> {
        let mut coerced = Record::new();
        for field in fields {
            let value = self.check_field(
                field,
                body.get(&field.name),
                query.get(&field.name),
                &field.name,
            )?;
            coerced.insert(field.name.clone(), value);
        }
        if self.failure.has_messages() {
            return Err(TrellisError::BadRequest(self.failure));
        }
        Ok(coerced)
    }

    /// Check one top-level field.
    pub fn check_field(
        &mut self,
        field: &FieldDescriptor,
        body: Option<&Value>,
        query: Option<&Value>,
        path: &str,
    ) -> Result<Value, TrellisError> {
        let flags = field.flags;
        if flags.is_private() {
            return self.private_value(field);
        }
        if flags.is_meta() || flags.is_state() {
            let Some(raw) = query.filter(|v| !v.is_null()) else {
                return Ok(self.absent(field, path));
            };
            if self.rejects_submission(flags, path) {
                return Ok(field.default.clone());
            }
            let shape = Shape::of(flags);
            let Some(value) = self.deserializer.deserialize(field.type_ref.type_name(), shape, raw) else {
                self.failure
                    .add(format!("{} does not have a valid value: {}", path, raw));
                return Ok(Value::Null);
            };
            return self.coerce_shape(field, &value, path, 0);
        }
        self.check_submitted(field, body, path, 0)
    }

    /// Messages collected so far.
    #[must_use]
    pub fn failure(&self) -> &ValidationFailure {
        &self.failure
    }

    fn private_value(&self, field: &FieldDescriptor) -> Result<Value, TrellisError> {
        if let (true, Some(pool)) = (field.flags.is_shared(), field.pool.as_deref()) {
            if let Some(value) = self.store.get(pool, &field.name)? {
                return Ok(value);
            }
        }
        Ok(field.default.clone())
    }

    fn absent(&mut self, field: &FieldDescriptor, path: &str) -> Value {
        let flags = field.flags;
        let enforced = flags.is_meta() || flags.is_state() || self.verb == Verb::Post;
        if flags.is_required() && enforced {
            self.failure.add(format!("{} is required", path));
        }
        field.default.clone()
    }

    fn rejects_submission(&mut self, flags: FieldFlags, path: &str) -> bool {
        if flags.is_readonly() {
            self.failure.add(format!("{} is readonly", path));
        }
        if flags.is_disabled() {
            self.failure.add(format!("{} is disabled", path));
        }
        flags.is_readonly() || flags.is_disabled()
    }

    /// Check a field whose only source is the submitted value.
    fn check_submitted(
        &mut self,
        field: &FieldDescriptor,
        submitted: Option<&Value>,
        path: &str,
        depth: usize,
    ) -> Result<Value, TrellisError> {
        if field.flags.is_private() {
            return Ok(field.default.clone());
        }
        let Some(value) = submitted.filter(|v| !v.is_null()) else {
            return Ok(self.absent(field, path));
        };
        if self.rejects_submission(field.flags, path) {
            return Ok(field.default.clone());
        }
        self.coerce_shape(field, value, path, depth)
    }

    fn expected(&mut self, path: &str, expected: &str, found: &Value) {
        self.failure.add(format!(
            "Expected type of {} is {}, {} found.",
            path,
            expected,
            found.kind_name()
        ));
    }

    fn too_deep(&mut self, path: &str, depth: usize) -> bool {
        if depth > MAX_NESTING_DEPTH {
            self.failure.add(format!(
                "{} exceeds the maximum nesting depth of {}",
                path, MAX_NESTING_DEPTH
            ));
            return true;
        }
        false
    }

    /// Apply the field's shape (array, matrix, multiple) and type.
    fn coerce_shape(
        &mut self,
        field: &FieldDescriptor,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Value, TrellisError> {
        if self.too_deep(path, depth) {
            return Ok(Value::Null);
        }
        let types = self.types;
        let field_type = types.resolve(&field.type_ref)?;
        let flags = field.flags;

        if flags.is_array() {
            let Some(items) = value.as_list() else {
                self.expected(path, "array", value);
                return Ok(Value::Null);
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(self.coerce_type(field_type, item, &format!("{}[{}]", path, i), depth + 1)?);
            }
            return Ok(Value::List(out));
        }

        if flags.is_matrix() {
            let Some(rows) = value.as_list() else {
                self.expected(path, "matrix", value);
                return Ok(Value::Null);
            };
            let mut out = Vec::with_capacity(rows.len());
            for (x, row) in rows.iter().enumerate() {
                let row_path = format!("{}[{}]", path, x);
                let Some(cells) = row.as_list() else {
                    self.expected(&row_path, "array", row);
                    out.push(Value::Null);
                    continue;
                };
                let mut coerced_row = Vec::with_capacity(cells.len());
                for (y, cell) in cells.iter().enumerate() {
                    let cell_path = format!("{}[{}]", row_path, y);
                    coerced_row.push(self.coerce_type(field_type, cell, &cell_path, depth + 2)?);
                }
                out.push(Value::List(coerced_row));
            }
            return Ok(Value::List(out));
        }

        if let (true, FieldType::Scalar(kind)) = (flags.is_multiple(), field_type) {
            let Some(text) = value.as_str() else {
                self.expected(path, "string", value);
                return Ok(Value::Null);
            };
            let mut parts = Vec::new();
            for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match kind.validate(&Value::from(part)) {
                    Some(valid) => parts.push(valid.to_string()),
                    None => self
                        .failure
                        .add(format!("{} does not have a valid value: {}", path, part)),
                }
            }
            return Ok(Value::String(parts.join(",")));
        }

        self.coerce_type(field_type, value, path, depth)
    }

    /// Validate one value against a resolved type.
    fn coerce_type(
        &mut self,
        field_type: FieldType<'_>,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Value, TrellisError> {
        if self.too_deep(path, depth) {
            return Ok(Value::Null);
        }
        match field_type {
            FieldType::Scalar(kind) => Ok(kind.validate(value).unwrap_or_else(|| {
                self.failure
                    .add(format!("{} does not have a valid value: {}", path, value));
                Value::Null
            })),
            FieldType::Object(table) => {
                let Some(record) = value.as_record() else {
                    self.expected(path, "object", value);
                    return Ok(Value::Null);
                };
                let schema = self.schema;
                let mut out = Record::new();
                for nested in schema.table(table) {
                    let nested_path = format!("{}.{}", path, nested.name);
                    let coerced =
                        self.check_submitted(nested, record.get(&nested.name), &nested_path, depth + 1)?;
                    out.insert(nested.name.clone(), coerced);
                }
                Ok(Value::Record(out))
            }
            FieldType::Tuple(table) => {
                let Some(items) = value.as_list() else {
                    self.expected(path, "tuple", value);
                    return Ok(Value::Null);
                };
                let schema = self.schema;
                let mut out = Vec::new();
                for (i, nested) in schema.table(table).iter().enumerate() {
                    let nested_path = format!("{}[{}]", path, i);
                    out.push(self.check_submitted(nested, items.get(i), &nested_path, depth + 1)?);
                }
                Ok(Value::List(out))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
