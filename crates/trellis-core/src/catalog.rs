//! # Catalog
//!
//! Immutable in-memory definition cache.
//!
//! Variants are grouped per resource. Every variant class is an alias of its
//! group, so resolving any class of a group picks among all of the group's
//! variants. That is what lets a recondition cascade move from one variant
//! to another and back.
//!
//! Resolution picks the variant whose `when` conditions all hold in the
//! lookup key and that requires the most conditions. On a tie the variant
//! declared first wins.

use crate::ports::DefinitionCache;
use crate::schema::{FieldDescriptor, Schema, TableId};
use crate::variant::{Variant, VariantDef};
use crate::{Conditions, TrellisError};
use std::collections::BTreeMap;
use std::sync::Arc;

type UnitKey = (String, String);

/// Builds a `Catalog`, validating every definition.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    schema: Schema,
    pending: Vec<(String, String, VariantDef)>,
    roots: BTreeMap<String, String>,
}

impl CatalogBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a table id for a structure defined later.
    pub fn reserve_table(&mut self) -> TableId {
        self.schema.reserve()
    }

    pub fn define_table(&mut self, id: TableId, fields: Vec<FieldDescriptor>) -> Result<(), TrellisError> {
        self.schema.define(id, fields)
    }

    /// Add a table in one step.
    pub fn table(&mut self, fields: Vec<FieldDescriptor>) -> Result<TableId, TrellisError> {
        self.schema.add(fields)
    }

    /// Add a variant to the resource `resource` of `unit`.
    pub fn variant(
        &mut self,
        unit: impl Into<String>,
        resource: impl Into<String>,
        def: VariantDef,
    ) -> &mut Self {
        self.pending.push((unit.into(), resource.into(), def));
        self
    }

    /// Set the root resource of `unit`.
    pub fn root(&mut self, unit: impl Into<String>, resource: impl Into<String>) -> &mut Self {
        self.roots.insert(unit.into(), resource.into());
        self
    }

    pub fn build(self) -> Result<Catalog, TrellisError> {
        self.schema.verify()?;
        let schema = Arc::new(self.schema);

        let mut groups: BTreeMap<UnitKey, Vec<Arc<Variant>>> = BTreeMap::new();
        let mut aliases: BTreeMap<UnitKey, String> = BTreeMap::new();

        for (unit, resource, def) in self.pending {
            let variant = Arc::new(Variant::new(Arc::clone(&schema), def)?);
            for class in [resource.as_str(), variant.class()] {
                let key = (unit.clone(), class.to_string());
                match aliases.get(&key) {
                    Some(group) if *group != resource => {
                        return Err(TrellisError::InvalidDefinition(format!(
                            "Class '{}' belongs to both '{}' and '{}'",
                            class, group, resource
                        )));
                    }
                    Some(_) => {}
                    None => {
                        aliases.insert(key, resource.clone());
                    }
                }
            }
            groups
                .entry((unit, resource))
                .or_default()
                .push(variant);
        }

        for (unit, root) in &self.roots {
            if !groups.contains_key(&(unit.clone(), root.clone())) {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Root resource '{}' of unit '{}' has no variants",
                    root, unit
                )));
            }
        }

        tracing::debug!(
            groups = groups.len(),
            tables = schema.len(),
            "catalog built"
        );

        Ok(Catalog {
            schema,
            groups,
            aliases,
            roots: self.roots,
        })
    }
}

/// Immutable definition cache.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Arc<Schema>,
    groups: BTreeMap<UnitKey, Vec<Arc<Variant>>>,
    aliases: BTreeMap<UnitKey, String>,
    roots: BTreeMap<String, String>,
}

impl Catalog {
    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Every class identity known in `unit`, resources and variant classes.
    pub fn classes<'a>(&'a self, unit: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.aliases
            .keys()
            .filter(move |(u, _)| u == unit)
            .map(|(_, class)| class.as_str())
    }

    #[must_use]
    pub fn root_class(&self, unit: &str) -> Option<&str> {
        self.roots.get(unit).map(String::as_str)
    }

    /// Number of variants over all units.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    fn select(&self, unit: &str, class: &str, key: &Conditions) -> Option<Arc<Variant>> {
        let group = self.aliases.get(&(unit.to_string(), class.to_string()))?;
        let variants = self.groups.get(&(unit.to_string(), group.clone()))?;
        let mut best: Option<&Arc<Variant>> = None;
        for variant in variants.iter().filter(|v| v.matches(key)) {
            if best.is_none_or(|b| variant.when().len() > b.when().len()) {
                best = Some(variant);
            }
        }
        best.cloned()
    }
}

impl DefinitionCache for Catalog {
    fn resolve_root(&self, unit: &str, conditions: &Conditions) -> Option<Arc<Variant>> {
        let root = self.roots.get(unit)?;
        self.select(unit, root, conditions)
    }

    fn resolve(&self, unit: &str, class: &str, conditions: &Conditions) -> Option<Arc<Variant>> {
        self.select(unit, class, conditions)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VerbSpec;
    use crate::{Value, Verb};

    fn account_catalog() -> Catalog {
        let mut builder = CatalogBuilder::new();
        let table = builder.table(vec![]).expect("table");
        builder
            .variant(
                "shop",
                "shop.Account",
                VariantDef::new("shop.Account", table).verb(Verb::Get, VerbSpec::new("show")),
            )
            .variant(
                "shop",
                "shop.Account",
                VariantDef::new("shop.BusinessAccount", table)
                    .verb(Verb::Get, VerbSpec::new("show"))
                    .when("kind", "business"),
            )
            .variant(
                "shop",
                "shop.Account",
                VariantDef::new("shop.DutchBusinessAccount", table)
                    .verb(Verb::Get, VerbSpec::new("show"))
                    .when("kind", "business")
                    .when("locale", "nl"),
            )
            .root("shop", "shop.Account");
        builder.build().expect("catalog")
    }

    fn key(pairs: &[(&str, &str)]) -> Conditions {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn most_specific_variant_wins() {
        let catalog = account_catalog();
        let resolved = |k: &Conditions| {
            catalog
                .resolve("shop", "shop.Account", k)
                .map(|v| v.class().to_string())
        };
        assert_eq!(resolved(&key(&[])).as_deref(), Some("shop.Account"));
        assert_eq!(
            resolved(&key(&[("kind", "business")])).as_deref(),
            Some("shop.BusinessAccount")
        );
        assert_eq!(
            resolved(&key(&[("kind", "business"), ("locale", "nl")])).as_deref(),
            Some("shop.DutchBusinessAccount")
        );
    }

    #[test]
    fn variant_classes_resolve_through_their_group() {
        let catalog = account_catalog();
        let variant = catalog
            .resolve("shop", "shop.BusinessAccount", &key(&[("kind", "personal")]))
            .expect("variant");
        assert_eq!(variant.class(), "shop.Account");
        assert!(catalog.resolve("shop", "shop.Unknown", &key(&[])).is_none());
        assert!(catalog.resolve("other", "shop.Account", &key(&[])).is_none());
    }

    #[test]
    fn root_resolution() {
        let catalog = account_catalog();
        assert!(catalog.resolve_root("shop", &key(&[])).is_some());
        assert!(catalog.resolve_root("other", &key(&[])).is_none());
        assert_eq!(catalog.classes("shop").count(), 3);
        assert_eq!(catalog.variant_count(), 3);
    }

    #[test]
    fn class_in_two_groups_is_rejected() {
        let mut builder = CatalogBuilder::new();
        let table = builder.table(vec![]).expect("table");
        builder
            .variant(
                "shop",
                "shop.A",
                VariantDef::new("shop.Shared", table).verb(Verb::Get, VerbSpec::new("show")),
            )
            .variant(
                "shop",
                "shop.B",
                VariantDef::new("shop.Shared", table).verb(Verb::Get, VerbSpec::new("show")),
            );
        assert!(builder.build().is_err());
    }

    #[test]
    fn root_without_variants_is_rejected() {
        let mut builder = CatalogBuilder::new();
        builder.root("shop", "shop.Nothing");
        assert!(builder.build().is_err());
    }
}
