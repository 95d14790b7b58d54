//! # Property-Based Tests
//!
//! Cascade bounds and coercion invariants, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use trellis_core::primitives::MAX_CASCADE_ITERATIONS;
use trellis_core::processor::coerce::Coercion;
use trellis_core::processor::recon::{ReconMode, extract_recon_conditions, run_cascade};
use trellis_core::{
    CallInput, CatalogBuilder, ClassRegistry, Conditions, DefinitionCache, EngineBuilder,
    EngineConfig, FieldDescriptor, FieldFlags, MemoryStore, PlainObject, Record, Schema,
    TrellisError, TypeRegistry, TypedDeserializer, Value, Variant, VariantDef, Verb, VerbSpec,
};

// =============================================================================
// FIXTURES
// =============================================================================

/// Hands out a variant with a fresh recon field on every resolution, so the
/// conditions change on every iteration.
struct EscalatingCache {
    variants: Vec<Arc<Variant>>,
    calls: AtomicUsize,
}

impl EscalatingCache {
    fn new(depth: usize) -> Self {
        let mut schema = Schema::new();
        let tables: Vec<_> = (0..depth)
            .map(|i| {
                schema
                    .add(vec![
                        FieldDescriptor::scalar(format!("c{}", i), "string").with_flags(FieldFlags::RECON),
                    ])
                    .expect("table")
            })
            .collect();
        let schema = Arc::new(schema);
        let variants = tables
            .into_iter()
            .enumerate()
            .map(|(i, table)| {
                let def = VariantDef::new(format!("prop.V{}", i), table)
                    .verb(Verb::Get, VerbSpec::new("show"));
                Arc::new(Variant::new(Arc::clone(&schema), def).expect("variant"))
            })
            .collect();
        Self {
            variants,
            calls: AtomicUsize::new(0),
        }
    }

    fn first(&self) -> Arc<Variant> {
        Arc::clone(&self.variants[0])
    }
}

impl DefinitionCache for EscalatingCache {
    fn resolve_root(&self, unit: &str, conditions: &Conditions) -> Option<Arc<Variant>> {
        self.resolve(unit, "prop.V0", conditions)
    }

    fn resolve(&self, _unit: &str, _class: &str, _conditions: &Conditions) -> Option<Arc<Variant>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.variants.get(n.min(self.variants.len() - 1)).cloned()
    }
}

fn account_variants() -> (trellis_core::Catalog, Arc<Variant>) {
    let mut builder = CatalogBuilder::new();
    let base = builder
        .table(vec![FieldDescriptor::scalar("kind", "string").with_flags(FieldFlags::RECON)])
        .expect("base");
    let business = builder
        .table(vec![
            FieldDescriptor::scalar("kind", "string").with_flags(FieldFlags::RECON),
            FieldDescriptor::scalar("country", "string").with_flags(FieldFlags::RECON),
        ])
        .expect("business");
    builder
        .variant(
            "prop",
            "prop.Account",
            VariantDef::new("prop.Account", base).verb(Verb::Get, VerbSpec::new("show")),
        )
        .variant(
            "prop",
            "prop.Account",
            VariantDef::new("prop.Business", business)
                .verb(Verb::Get, VerbSpec::new("show"))
                .when("kind", "business"),
        )
        .variant(
            "prop",
            "prop.Account",
            VariantDef::new("prop.DutchBusiness", business)
                .verb(Verb::Get, VerbSpec::new("show"))
                .when("kind", "business")
                .when("country", "nl"),
        );
    let catalog = builder.build().expect("catalog");
    let start = catalog
        .resolve("prop", "prop.Account", &Conditions::new())
        .expect("base variant");
    (catalog, start)
}

fn coerce(
    schema: &Schema,
    fields: &[FieldDescriptor],
    body: Record,
) -> Result<Record, TrellisError> {
    let types = TypeRegistry::with_builtins();
    let store = MemoryStore::new();
    Coercion::new(schema, &types, &TypedDeserializer, &store, Verb::Post, "prop.Form")
        .check_table(fields, &body, &Record::new())
}

fn kind_value() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("business".to_string())),
        Just(Some("personal".to_string())),
        "[a-z]{1,8}".prop_map(Some),
    ]
}

fn country_value() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some("nl".to_string())), "[a-z]{2}".prop_map(Some)]
}

// =============================================================================
// CASCADE PROPERTIES
// =============================================================================

proptest! {
    /// The cascade never makes more than five resolutions.
    #[test]
    fn cascade_is_bounded(extra in 0usize..20, post_call in any::<bool>()) {
        let cache = EscalatingCache::new(MAX_CASCADE_ITERATIONS + 5);
        let source: Record = (0..MAX_CASCADE_ITERATIONS + 5 + extra)
            .map(|i| (format!("c{}", i), Value::from(format!("v{}", i))))
            .collect();
        let mode = if post_call { ReconMode::PostCall } else { ReconMode::PreCall };

        let outcome = run_cascade(&cache, "prop", &Conditions::new(), &cache.first(), &Conditions::new(), &source, mode);

        prop_assert_eq!(outcome.attempts, MAX_CASCADE_ITERATIONS);
        prop_assert!(!outcome.converged);
        prop_assert_eq!(cache.calls.load(Ordering::SeqCst), MAX_CASCADE_ITERATIONS);
    }

    /// One more extraction at the fixed point changes nothing.
    #[test]
    fn cascade_is_idempotent_at_fixed_point(kind in kind_value(), country in country_value(), post_call in any::<bool>()) {
        let (catalog, start) = account_variants();
        let mut source = Record::new();
        if let Some(kind) = kind {
            source.insert("kind".to_string(), Value::from(kind));
        }
        if let Some(country) = country {
            source.insert("country".to_string(), Value::from(country));
        }
        let mode = if post_call { ReconMode::PostCall } else { ReconMode::PreCall };

        let outcome = run_cascade(&catalog, "prop", &Conditions::new(), &start, &Conditions::new(), &source, mode);
        prop_assert!(outcome.converged);
        prop_assert!(outcome.attempts <= MAX_CASCADE_ITERATIONS);

        let again = extract_recon_conditions(
            outcome.variant.schema(),
            outcome.variant.fields(),
            &outcome.conditions,
            &source,
            mode,
            "",
        );
        prop_assert_eq!(again, outcome.conditions);
    }

    /// A condition that is already present keeps its value.
    #[test]
    fn extraction_never_overwrites(seed in any::<i64>(), submitted in any::<i64>(), post_call in any::<bool>()) {
        let mut schema = Schema::new();
        let table = schema
            .add(vec![FieldDescriptor::scalar("x", "integer").with_flags(FieldFlags::RECON)])
            .expect("table");
        let mut conditions = Conditions::new();
        conditions.insert("x".to_string(), Value::Int(seed));
        let source: Record = [("x".to_string(), Value::Int(submitted))].into_iter().collect();
        let mode = if post_call { ReconMode::PostCall } else { ReconMode::PreCall };

        let out = extract_recon_conditions(&schema, schema.table(table), &conditions, &source, mode, "");
        prop_assert_eq!(out.get("x"), Some(&Value::Int(seed)));
    }
}

// =============================================================================
// COERCION PROPERTIES
// =============================================================================

proptest! {
    /// Valid scalar input comes back unchanged in the data section.
    #[test]
    fn valid_input_round_trips(
        name in "[a-zA-Z0-9]{1,20}",
        count in any::<i64>(),
        active in any::<bool>(),
    ) {
        let mut builder = CatalogBuilder::new();
        let table = builder
            .table(vec![
                FieldDescriptor::scalar("name", "string"),
                FieldDescriptor::scalar("count", "integer"),
                FieldDescriptor::scalar("active", "boolean"),
                FieldDescriptor::scalar("token", "string").with_flags(FieldFlags::STATE),
            ])
            .expect("table");
        builder.variant(
            "prop",
            "prop.Form",
            VariantDef::new("prop.Form", table).verb(Verb::Post, VerbSpec::new("save")),
        );
        let mut classes: ClassRegistry<()> = ClassRegistry::new();
        classes.register_default::<PlainObject>("prop.Form");
        let engine = EngineBuilder::new(
            EngineConfig::new("prop"),
            Arc::new(builder.build().expect("catalog")),
            classes,
            (),
        )
        .build();

        let body: Record = [
            ("name".to_string(), Value::from(name.clone())),
            ("count".to_string(), Value::Int(count)),
            ("active".to_string(), Value::Bool(active)),
        ]
        .into_iter()
        .collect();
        let response = engine
            .create_resource("prop.Form", Verb::Post, Conditions::new())
            .expect("processor")
            .call(CallInput::new(body, Record::new()))
            .expect("call");
        let document = response.document().expect("document");

        prop_assert_eq!(document.data_value("name"), Some(&Value::from(name)));
        prop_assert_eq!(document.data_value("count"), Some(&Value::Int(count)));
        prop_assert_eq!(document.data_value("active"), Some(&Value::Bool(active)));
        prop_assert!(document.data_value("token").is_none());
    }

    /// A readonly submission yields exactly one message and the other fields
    /// are still checked.
    #[test]
    fn readonly_messages_are_aggregated(
        locked in "[a-z]{1,10}",
        counts in vec(prop_oneof![any::<i64>().prop_map(Value::Int), "[a-z]{1,5}".prop_map(Value::from)], 1..6),
    ) {
        let mut schema = Schema::new();
        let mut fields = vec![FieldDescriptor::scalar("locked", "string").with_flags(FieldFlags::READONLY)];
        fields.extend((0..counts.len()).map(|i| FieldDescriptor::scalar(format!("n{}", i), "integer")));
        let table = schema.add(fields).expect("table");

        let mut body: Record = [("locked".to_string(), Value::from(locked))].into_iter().collect();
        for (i, value) in counts.iter().enumerate() {
            body.insert(format!("n{}", i), value.clone());
        }
        let invalid = counts.iter().filter(|v| v.as_i64().is_none()).count();

        let Err(TrellisError::BadRequest(failure)) = coerce(&schema, schema.table(table), body) else {
            return Err(TestCaseError::fail("readonly submission must fail"));
        };
        let locked_messages: Vec<_> = failure.messages.iter().filter(|m| m.starts_with("locked")).collect();
        prop_assert_eq!(locked_messages, vec!["locked is readonly"]);
        prop_assert_eq!(failure.messages.len(), 1 + invalid);
    }

    /// One invalid cell of a 2x3 matrix gives one message at its position.
    #[test]
    fn matrix_reports_each_invalid_cell(x in 0usize..2, y in 0usize..3, cells in vec(any::<i64>(), 6)) {
        let mut schema = Schema::new();
        let table = schema
            .add(vec![FieldDescriptor::scalar("grid", "integer").with_flags(FieldFlags::MATRIX)])
            .expect("table");
        let field = &schema.table(table)[0];

        let rows: Vec<Value> = (0..2)
            .map(|r| {
                Value::List(
                    (0..3)
                        .map(|c| {
                            if (r, c) == (x, y) {
                                Value::from("bad")
                            } else {
                                Value::Int(cells[r * 3 + c])
                            }
                        })
                        .collect(),
                )
            })
            .collect();
        let submitted = Value::List(rows);

        let types = TypeRegistry::with_builtins();
        let store = MemoryStore::new();
        let mut coercion = Coercion::new(&schema, &types, &TypedDeserializer, &store, Verb::Post, "prop.Grid");
        let coerced = coercion.check_field(field, Some(&submitted), None, "grid").expect("coerce");

        prop_assert_eq!(
            &coercion.failure().messages,
            &vec![format!("grid[{}][{}] does not have a valid value: bad", x, y)]
        );
        for r in 0..2 {
            for c in 0..3 {
                let cell = coerced.index(r).and_then(|row| row.index(c));
                if (r, c) == (x, y) {
                    prop_assert_eq!(cell, Some(&Value::Null));
                } else {
                    prop_assert_eq!(cell, Some(&Value::Int(cells[r * 3 + c])));
                }
            }
        }
    }
}
