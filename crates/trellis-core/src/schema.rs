//! # Field Descriptor Tables
//!
//! Descriptor tables are stored in an arena (`Schema`) and addressed by
//! `TableId`. Object and tuple fields reference their nested table by id, so
//! a structure may refer back to itself or to an ancestor without copying.
//!
//! Tables are checked when they are defined:
//! - field names are unique within a table
//! - a field has at most one placement (meta, data, state, private)
//! - a field is not both array and matrix
//! - at most one field claims the data section, and if one does every other
//!   field is meta, state or private
//! - shared fields name a pool

use crate::{FieldFlags, TrellisError, Value};
use std::collections::BTreeSet;

/// Handle of a descriptor table inside a `Schema`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(usize);

impl TableId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Type reference of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Scalar kind looked up by name in the `TypeRegistry`.
    Scalar(String),
    /// Record with the fields of the referenced table.
    Object(TableId),
    /// Positional list with the fields of the referenced table.
    Tuple(TableId),
}

impl TypeRef {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::Scalar(name.into())
    }

    /// Name handed to the deserializer and written as type metadata.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Scalar(name) => name,
            Self::Object(_) => "object",
            Self::Tuple(_) => "tuple",
        }
    }

    #[must_use]
    pub const fn nested_table(&self) -> Option<TableId> {
        match self {
            Self::Scalar(_) => None,
            Self::Object(id) | Self::Tuple(id) => Some(*id),
        }
    }
}

/// One field of a descriptor table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_ref: TypeRef,
    pub default: Value,
    pub flags: FieldFlags,
    pub autocomplete: Option<String>,
    /// Translation template.
    pub label: Option<String>,
    pub icon: Option<String>,
    /// Shared store namespace, required for shared fields.
    pub pool: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            default: Value::Null,
            flags: FieldFlags::empty(),
            autocomplete: None,
            label: None,
            icon: None,
            pool: None,
        }
    }

    /// Shorthand for a scalar field.
    pub fn scalar(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(name, TypeRef::scalar(kind))
    }

    #[must_use]
    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = default.into();
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn with_autocomplete(mut self, autocomplete: impl Into<String>) -> Self {
        self.autocomplete = Some(autocomplete.into());
        self
    }

    #[must_use]
    pub fn in_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }
}

/// Arena of descriptor tables.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<Option<Vec<FieldDescriptor>>>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a table defined later (self-referential structures).
    pub fn reserve(&mut self) -> TableId {
        self.tables.push(None);
        TableId(self.tables.len() - 1)
    }

    /// Define a previously reserved table.
    pub fn define(&mut self, id: TableId, fields: Vec<FieldDescriptor>) -> Result<(), TrellisError> {
        validate_table(&fields)?;
        let Some(slot) = self.tables.get_mut(id.0) else {
            return Err(TrellisError::InvalidDefinition(format!(
                "Table {} was never reserved",
                id.0
            )));
        };
        if slot.is_some() {
            return Err(TrellisError::InvalidDefinition(format!(
                "Table {} is already defined",
                id.0
            )));
        }
        *slot = Some(fields);
        Ok(())
    }

    /// Reserve and define in one step.
    pub fn add(&mut self, fields: Vec<FieldDescriptor>) -> Result<TableId, TrellisError> {
        let id = self.reserve();
        self.define(id, fields)?;
        Ok(id)
    }

    /// Fields of a table. Unknown or undefined tables are empty.
    #[must_use]
    pub fn table(&self, id: TableId) -> &[FieldDescriptor] {
        self.tables
            .get(id.0)
            .and_then(Option::as_deref)
            .unwrap_or(&[])
    }

    /// Every table with its id, in reservation order.
    pub fn tables(&self) -> impl Iterator<Item = (TableId, &[FieldDescriptor])> {
        self.tables
            .iter()
            .enumerate()
            .map(|(index, slot)| (TableId(index), slot.as_deref().unwrap_or(&[])))
    }

    #[must_use]
    pub fn is_defined(&self, id: TableId) -> bool {
        matches!(self.tables.get(id.0), Some(Some(_)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Check that every reserved table is defined and every nested type
    /// reference points at a defined table.
    pub fn verify(&self) -> Result<(), TrellisError> {
        for (index, slot) in self.tables.iter().enumerate() {
            let Some(fields) = slot else {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Table {} was reserved but never defined",
                    index
                )));
            };
            for field in fields {
                if let Some(nested) = field.type_ref.nested_table() {
                    if !self.is_defined(nested) {
                        return Err(TrellisError::InvalidDefinition(format!(
                            "Field '{}' refers to undefined table {}",
                            field.name, nested.0
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_table(fields: &[FieldDescriptor]) -> Result<(), TrellisError> {
    let mut names = BTreeSet::new();
    let mut data_field: Option<&str> = None;

    for field in fields {
        if !names.insert(field.name.as_str()) {
            return Err(TrellisError::InvalidDefinition(format!(
                "Duplicate field '{}'",
                field.name
            )));
        }
        if field.flags.placement_count() > 1 {
            return Err(TrellisError::InvalidDefinition(format!(
                "Field '{}' has conflicting placements: {}",
                field.name, field.flags
            )));
        }
        if field.flags.is_array() && field.flags.is_matrix() {
            return Err(TrellisError::InvalidDefinition(format!(
                "Field '{}' cannot be both array and matrix",
                field.name
            )));
        }
        if field.flags.is_shared() && field.pool.is_none() {
            return Err(TrellisError::InvalidDefinition(format!(
                "Shared field '{}' has no pool",
                field.name
            )));
        }
        if field.flags.is_data() {
            if let Some(first) = data_field {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Fields '{}' and '{}' both claim the data section",
                    first, field.name
                )));
            }
            data_field = Some(&field.name);
        }
    }

    if let Some(data) = data_field {
        let plain = fields.iter().find(|f| {
            !f.flags.is_data() && !f.flags.is_meta() && !f.flags.is_hidden_from_client()
        });
        if let Some(other) = plain {
            return Err(TrellisError::InvalidDefinition(format!(
                "Field '{}' claims the data section, so '{}' must be meta, state or private",
                data, other.name
            )));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
