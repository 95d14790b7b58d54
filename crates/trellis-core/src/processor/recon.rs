//! Recondition cascade.
//!
//! `recon` fields are discriminators: their values become lookup conditions
//! and may select a different variant, which may declare further `recon`
//! fields. The cascade re-resolves until the conditions stop changing or
//! `MAX_CASCADE_ITERATIONS` resolutions have been made.
//!
//! Conditions only grow. A name that is already present keeps its value, so
//! the shallowest and earliest discriminator wins.

use crate::ports::DefinitionCache;
use crate::primitives::{MAX_CASCADE_ITERATIONS, MAX_NESTING_DEPTH, RECON_PREFIX_SEPARATOR};
use crate::schema::{FieldDescriptor, Schema, TypeRef};
use crate::variant::Variant;
use crate::{Conditions, Record, Value, merge_conditions};
use std::sync::Arc;

/// Which values condition extraction reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconMode {
    /// Submitted values. Only names present in the input are added.
    PreCall,
    /// Object attributes after the handler. Unset names are added as null.
    PostCall,
}

/// Add the conditions implied by `source` to `conditions`.
///
/// Recurses into single object fields whose value is a record, prefixing
/// nested names with `{prefix}{name}_`.
#[must_use]
pub fn extract_recon_conditions(
    schema: &Schema,
    fields: &[FieldDescriptor],
    conditions: &Conditions,
    source: &Record,
    mode: ReconMode,
    prefix: &str,
) -> Conditions {
    let mut out = conditions.clone();
    extract_into(schema, fields, &mut out, source, mode, prefix, 0);
    out
}

fn extract_into(
    schema: &Schema,
    fields: &[FieldDescriptor],
    conditions: &mut Conditions,
    source: &Record,
    mode: ReconMode,
    prefix: &str,
    depth: usize,
) {
    for field in fields {
        if field.flags.is_recon() {
            let key = format!("{}{}", prefix, field.name);
            if !conditions.contains_key(&key) {
                match (mode, source.get(&field.name)) {
                    (_, Some(value)) => {
                        conditions.insert(key, value.clone());
                    }
                    (ReconMode::PostCall, None) => {
                        conditions.insert(key, Value::Null);
                    }
                    (ReconMode::PreCall, None) => {}
                }
            }
        }

        let single = !field.flags.is_array() && !field.flags.is_matrix();
        let nested = match (&field.type_ref, source.get(&field.name)) {
            (TypeRef::Object(table), Some(Value::Record(record))) if single => {
                Some((*table, record))
            }
            _ => None,
        };
        if let Some((table, record)) = nested {
            if depth >= MAX_NESTING_DEPTH {
                continue;
            }
            let nested_prefix = format!("{}{}{}", prefix, field.name, RECON_PREFIX_SEPARATOR);
            extract_into(
                schema,
                schema.table(table),
                conditions,
                record,
                mode,
                &nested_prefix,
                depth + 1,
            );
        }
    }
}

/// Result of one cascade.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    /// The last resolved variant, or the starting variant if none resolved.
    pub variant: Arc<Variant>,
    pub conditions: Conditions,
    /// Number of cache resolutions made.
    pub attempts: usize,
    pub converged: bool,
}

/// Run a cascade starting from `variant` and the creation conditions.
pub fn run_cascade(
    cache: &dyn DefinitionCache,
    unit: &str,
    tags: &Conditions,
    variant: &Arc<Variant>,
    initial: &Conditions,
    source: &Record,
    mode: ReconMode,
) -> CascadeOutcome {
    let mut current = Arc::clone(variant);
    let mut conditions =
        extract_recon_conditions(current.schema(), current.fields(), initial, source, mode, "");
    let mut attempts = 0;
    let mut converged = false;

    while attempts < MAX_CASCADE_ITERATIONS {
        attempts += 1;
        let key = merge_conditions(&conditions, tags);
        if let Some(found) = cache.resolve(unit, current.class(), &key) {
            current = found;
        }
        let next =
            extract_recon_conditions(current.schema(), current.fields(), &conditions, source, mode, "");
        if next == conditions {
            converged = true;
            break;
        }
        conditions = next;
    }

    if converged {
        tracing::debug!(
            class = current.class(),
            attempts,
            ?mode,
            "recondition cascade converged"
        );
    } else {
        tracing::warn!(
            class = current.class(),
            attempts,
            ?mode,
            "recondition cascade did not converge, keeping last variant"
        );
    }

    CascadeOutcome {
        variant: current,
        conditions,
        attempts,
        converged,
    }
}

// =============================================================================
// TESTS
// =============================================================================
