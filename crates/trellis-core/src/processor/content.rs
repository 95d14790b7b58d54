//! Content assembly.
//!
//! Two passes over the root table:
//!
//! 1. State and private fields. Shared ones are pushed to the store
//!    (private persistent, state volatile) and non-null state values are
//!    collected, preferring preserved values.
//! 2. Everything else, in table order. Values are routed to `meta`, to the
//!    whole data slot (`data` flag) or to `data[name]`, and every emitted
//!    field gets a schema record in `fields`.
//!
//! Single object fields recurse: nested meta lands under `meta[name]`,
//! nested data under `data[name]` or, for a `data` flagged field, in the
//! parent's data slot. A table that is already being emitted further up and
//! has no value is not entered again.

use crate::kind::{FieldType, TypeRegistry};
use crate::ports::{SharedStore, Translator};
use crate::primitives::MAX_NESTING_DEPTH;
use crate::response::Response;
use crate::schema::{FieldDescriptor, Schema, TableId};
use crate::{Record, TrellisError, Value};

/// Sections produced for one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub meta: Option<Record>,
    pub data: Option<Value>,
    pub state: Record,
    pub fields: Vec<Record>,
}

impl Content {
    fn meta_mut(&mut self) -> &mut Record {
        self.meta.get_or_insert_with(Record::new)
    }

    /// The data section as a record. `None` when a data field claimed it.
    fn data_record(&mut self) -> Option<&mut Record> {
        match self.data.get_or_insert_with(|| Value::Record(Record::new())) {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    fn route(&mut self, field: &FieldDescriptor, value: Value) {
        if field.flags.is_meta() {
            self.meta_mut().insert(field.name.clone(), value);
        } else if field.flags.is_data() {
            self.data = Some(value);
        } else if let Some(data) = self.data_record() {
            data.insert(field.name.clone(), value);
        }
    }
}

/// Builds the document sections of one call.
pub struct Assembler<'a> {
    schema: &'a Schema,
    types: &'a TypeRegistry,
    translator: &'a dyn Translator,
    store: &'a dyn SharedStore,
    response: &'a Response,
    /// Scalar attributes of the object, for label translation.
    params: Record,
}

impl<'a> Assembler<'a> {
    pub fn new(
        schema: &'a Schema,
        types: &'a TypeRegistry,
        translator: &'a dyn Translator,
        store: &'a dyn SharedStore,
        response: &'a Response,
        params: Record,
    ) -> Self {
        Self {
            schema,
            types,
            translator,
            store,
            response,
            params,
        }
    }

    /// Assemble the content of the root table `table` from `source`.
    pub fn assemble(
        &self,
        table: TableId,
        source: &Record,
        preserve: Option<&Record>,
    ) -> Result<Content, TrellisError> {
        let fields = self.schema.table(table);
        let state = self.share_and_collect_state(fields, source, preserve)?;

        let mut content = Content::default();
        let mut stack = vec![table];
        self.emit_fields(fields, Some(source), preserve, "", &state, &mut stack, &mut content)?;
        content.state = state;
        Ok(content)
    }

    fn share_and_collect_state(
        &self,
        fields: &[FieldDescriptor],
        source: &Record,
        preserve: Option<&Record>,
    ) -> Result<Record, TrellisError> {
        let mut state = Record::new();
        for field in fields.iter().filter(|f| f.flags.is_hidden_from_client()) {
            let live = source.get(&field.name).cloned().unwrap_or_default();
            if let (true, Some(pool)) = (field.flags.is_shared(), field.pool.as_deref()) {
                self.store
                    .set(pool, &field.name, &live, field.flags.is_private())?;
            }
            if field.flags.is_state() && !live.is_null() {
                let preserved = preserve
                    .and_then(|p| p.get(&field.name))
                    .filter(|v| !v.is_null())
                    .cloned();
                state.insert(field.name.clone(), preserved.unwrap_or(live));
            }
        }
        Ok(state)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_fields(
        &self,
        fields: &[FieldDescriptor],
        source: Option<&Record>,
        preserve: Option<&Record>,
        prefix: &str,
        state: &Record,
        stack: &mut Vec<TableId>,
        out: &mut Content,
    ) -> Result<(), TrellisError> {
        for field in fields.iter().filter(|f| !f.flags.is_hidden_from_client()) {
            let path = qualify(prefix, &field.name);
            let preserved = preserve.and_then(|p| p.get(&field.name)).filter(|v| !v.is_null());
            let value = preserved
                .or_else(|| source.and_then(|s| s.get(&field.name)))
                .cloned()
                .unwrap_or_default();

            let mut schema_record = self.field_schema(field, &path, state)?;
            let single = !field.flags.is_array() && !field.flags.is_matrix();

            match self.types.resolve(&field.type_ref)? {
                FieldType::Object(table) if single => {
                    let cyclic = stack.contains(&table) && value.is_null();
                    if cyclic || stack.len() > MAX_NESTING_DEPTH {
                        schema_record.insert("fields".to_string(), Value::List(Vec::new()));
                        out.fields.push(schema_record);
                        continue;
                    }
                    let mut nested = Content::default();
                    stack.push(table);
                    let result = self.emit_fields(
                        self.schema.table(table),
                        value.as_record(),
                        preserved.and_then(Value::as_record),
                        &path,
                        state,
                        stack,
                        &mut nested,
                    );
                    stack.pop();
                    result?;

                    schema_record.insert("fields".to_string(), records(nested.fields));
                    if let Some(meta) = nested.meta {
                        out.meta_mut().insert(field.name.clone(), Value::Record(meta));
                    }
                    if let Some(data) = nested.data {
                        if field.flags.is_data() {
                            out.data = Some(data);
                        } else if let Some(parent) = out.data_record() {
                            parent.insert(field.name.clone(), data);
                        }
                    }
                }
                FieldType::Object(table) | FieldType::Tuple(table) => {
                    let nested = self.schema_fields(table, &path, state, stack)?;
                    schema_record.insert("fields".to_string(), records(nested));
                    out.route(field, value);
                }
                FieldType::Scalar(_) => out.route(field, value),
            }
            out.fields.push(schema_record);
        }
        Ok(())
    }

    /// Schema records of a nested table, without values.
    fn schema_fields(
        &self,
        table: TableId,
        prefix: &str,
        state: &Record,
        stack: &mut Vec<TableId>,
    ) -> Result<Vec<Record>, TrellisError> {
        if stack.contains(&table) || stack.len() > MAX_NESTING_DEPTH {
            return Ok(Vec::new());
        }
        stack.push(table);
        let result = self.schema_fields_of(table, prefix, state, stack);
        stack.pop();
        result
    }

    fn schema_fields_of(
        &self,
        table: TableId,
        prefix: &str,
        state: &Record,
        stack: &mut Vec<TableId>,
    ) -> Result<Vec<Record>, TrellisError> {
        let mut out = Vec::new();
        for field in self
            .schema
            .table(table)
            .iter()
            .filter(|f| !f.flags.is_hidden_from_client())
        {
            let path = qualify(prefix, &field.name);
            let mut schema_record = self.field_schema(field, &path, state)?;
            if let Some(nested) = field.type_ref.nested_table() {
                let nested = self.schema_fields(nested, &path, state, stack)?;
                schema_record.insert("fields".to_string(), records(nested));
            }
            out.push(schema_record);
        }
        Ok(out)
    }

    /// The schema record of one emitted field.
    fn field_schema(
        &self,
        field: &FieldDescriptor,
        path: &str,
        state: &Record,
    ) -> Result<Record, TrellisError> {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from(field.name.as_str()));
        if let Some(label) = &field.label {
            let translated = self.translator.translate(label, &self.params);
            record.insert("label".to_string(), Value::String(translated));
        }
        if let Some(icon) = &field.icon {
            record.insert("icon".to_string(), Value::from(icon.as_str()));
        }
        if !field.default.is_null() {
            record.insert("defaultValue".to_string(), field.default.clone());
        }
        if let Some(autocomplete) = &field.autocomplete {
            record.insert("autocomplete".to_string(), Value::from(autocomplete.as_str()));
        }
        field
            .flags
            .emit_meta(&mut record, self.response.overrides_for(path))?;
        self.types
            .resolve(&field.type_ref)?
            .emit_meta(&mut record, state);
        Ok(record)
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn records(fields: Vec<Record>) -> Value {
    Value::List(fields.into_iter().map(Value::Record).collect())
}

// =============================================================================
// TESTS
// =============================================================================
