//! # Processor Scenarios
//!
//! End-to-end calls through `Engine` with a small shop catalog.

use std::sync::Arc;
use trellis_core::{
    CallInput, Catalog, CatalogBuilder, ClassRegistry, Engine, EngineBuilder, EngineConfig,
    FieldDescriptor, FieldFlags, Journal, JournalEntry, MemoryJournal, MemoryStore, PlainObject,
    Record, ResourceObject, Response, SharedStore, Status, TrellisError, Value, VariantDef, Verb,
    VerbSpec,
};

// =============================================================================
// FIXTURES
// =============================================================================

const UNIT: &str = "shop";

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

/// Adds one to `qty` on `add`, and links to the contact form.
#[derive(Default)]
struct Cart {
    attributes: Record,
}

impl ResourceObject<()> for Cart {
    fn get(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or_default()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn attributes(&self) -> Record {
        self.attributes.clone()
    }

    fn handle(
        &mut self,
        method: &str,
        journal: &dyn Journal,
        response: &mut Response,
        _deps: &(),
    ) -> Result<(), TrellisError> {
        match method {
            "show" => Ok(()),
            "add" => {
                let qty = self.get("qty").as_i64().unwrap_or(2);
                self.set("qty", Value::Int(qty + 1));
                journal.record(JournalEntry::now("shop.Cart", "add", 200));
                response.link("contact", "shop.Contact", Record::new());
                response.link("nowhere", "shop.Missing", Record::new());
                Ok(())
            }
            other => Err(TrellisError::Handler(format!("unknown method {}", other))),
        }
    }
}

/// Redirects home after a submission, or attaches the cart on `show`.
#[derive(Default)]
struct Contact {
    attributes: Record,
}

impl ResourceObject<()> for Contact {
    fn get(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or_default()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    fn attributes(&self) -> Record {
        self.attributes.clone()
    }

    fn handle(
        &mut self,
        method: &str,
        _journal: &dyn Journal,
        response: &mut Response,
        _deps: &(),
    ) -> Result<(), TrellisError> {
        match method {
            "show" => {
                response.attach("cart", "shop.Cart");
                response.field_overrides("email").readonly = true;
                Ok(())
            }
            "submit" => {
                response.set_location("shop.Home", Record::new());
                Ok(())
            }
            "lost" => {
                response.set_location("shop.Missing", Record::new());
                Ok(())
            }
            "attach_empty" => {
                response.attach("receipt", "shop.Receipt");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn catalog() -> Catalog {
    let mut builder = CatalogBuilder::new();

    let home = builder
        .table(vec![FieldDescriptor::scalar("title", "string").with_default("Shop")])
        .expect("home");
    let contact = builder
        .table(vec![
            FieldDescriptor::scalar("email", "email")
                .with_flags(FieldFlags::REQUIRED)
                .with_label("Email for {email}"),
        ])
        .expect("contact");
    let cart = builder
        .table(vec![
            FieldDescriptor::scalar("qty", "integer")
                .with_flags(FieldFlags::STATE | FieldFlags::SHARED)
                .in_pool("cart"),
        ])
        .expect("cart");
    let account = builder
        .table(vec![
            FieldDescriptor::scalar("kind", "string").with_flags(FieldFlags::META | FieldFlags::RECON),
        ])
        .expect("account");
    let business = builder
        .table(vec![
            FieldDescriptor::scalar("kind", "string").with_flags(FieldFlags::META | FieldFlags::RECON),
            FieldDescriptor::scalar("vat", "string").with_flags(FieldFlags::META),
        ])
        .expect("business");
    let receipt = builder.table(vec![]).expect("receipt");

    builder
        .variant(
            UNIT,
            "shop.Home",
            VariantDef::new("shop.Home", home)
                .hint("Welcome")
                .verb(Verb::Get, VerbSpec::new("show")),
        )
        .variant(
            UNIT,
            "shop.Contact",
            VariantDef::new("shop.Contact", contact)
                .hint("Contact {email}")
                .verb(Verb::Get, VerbSpec::new("show"))
                .verb(Verb::Post, VerbSpec::new("submit").with_status(303)),
        )
        .variant(
            UNIT,
            "shop.Contact",
            VariantDef::new("shop.LostContact", contact)
                .verb(Verb::Post, VerbSpec::new("lost").with_status(303))
                .verb(Verb::Get, VerbSpec::new("attach_empty"))
                .when("mode", "lost"),
        )
        .variant(
            UNIT,
            "shop.Cart",
            VariantDef::new("shop.Cart", cart)
                .verb(Verb::Get, VerbSpec::new("show"))
                .verb(Verb::Post, VerbSpec::new("add")),
        )
        .variant(
            UNIT,
            "shop.Account",
            VariantDef::new("shop.Account", account).verb(Verb::Get, VerbSpec::new("show")),
        )
        .variant(
            UNIT,
            "shop.Account",
            VariantDef::new("shop.BusinessAccount", business)
                .verb(Verb::Get, VerbSpec::new("show"))
                .when("kind", "business"),
        )
        .variant(
            UNIT,
            "shop.Receipt",
            VariantDef::new("shop.Receipt", receipt).verb(Verb::Get, VerbSpec::new("show").with_status(204)),
        )
        .variant(
            UNIT,
            "shop.Broken",
            VariantDef::new("shop.Broken", receipt).verb(Verb::Get, VerbSpec::new("show").with_status(418)),
        )
        .root(UNIT, "shop.Home");
    builder.build().expect("catalog")
}

fn classes() -> ClassRegistry<()> {
    let mut classes: ClassRegistry<()> = ClassRegistry::new();
    classes
        .register_default::<PlainObject>("shop.Home")
        .register_default::<Contact>("shop.Contact")
        .register_default::<Contact>("shop.LostContact")
        .register_default::<Cart>("shop.Cart")
        .register_default::<PlainObject>("shop.Account")
        .register_default::<PlainObject>("shop.BusinessAccount")
        .register_default::<PlainObject>("shop.Receipt")
        .register_default::<PlainObject>("shop.Broken");
    classes
}

struct Fixture {
    engine: Engine<()>,
    store: Arc<MemoryStore>,
    journal: Arc<MemoryJournal>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let journal = Arc::new(MemoryJournal::new());
    let engine = EngineBuilder::new(
        EngineConfig::new(UNIT).with_namespace("shop"),
        Arc::new(catalog()),
        classes(),
        (),
    )
    .store(store.clone())
    .journal(journal.clone())
    .build();
    Fixture {
        engine,
        store,
        journal,
    }
}

fn messages(err: TrellisError) -> Vec<String> {
    match err {
        TrellisError::BadRequest(failure) => failure.messages,
        other => vec![format!("unexpected error: {}", other)],
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

#[test]
fn missing_required_email_is_reported() {
    let fx = fixture();
    let err = fx
        .engine
        .create_resource("shop.Contact", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::default())
        .expect_err("must fail");
    assert_eq!(messages(err), vec!["email is required".to_string()]);
}

#[test]
fn valid_email_is_echoed_in_data() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Contact", Verb::Get, Default::default())
        .expect("processor")
        .call(CallInput::new(
            record(&[("email", Value::from("a@b.com"))]),
            Record::new(),
        ))
        .expect("call");

    assert_eq!(response.status(), Status::Ok);
    let document = response.document().expect("document");
    assert_eq!(document.data_value("email"), Some(&Value::from("a@b.com")));
    assert_eq!(document.hints, vec!["Contact a@b.com".to_string()]);

    let field = document.field("email").expect("email schema");
    assert_eq!(field.get("label"), Some(&Value::from("Email for a@b.com")));
    assert_eq!(field.get("required"), Some(&Value::Bool(true)));
    assert_eq!(field.get("readonly"), Some(&Value::Bool(true)));
    assert_eq!(field.get("type"), Some(&Value::from("email")));
}

#[test]
fn invalid_email_is_rejected_with_its_value() {
    let fx = fixture();
    let err = fx
        .engine
        .create_resource("shop.Contact", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::new(
            record(&[("email", Value::from("not-an-email"))]),
            Record::new(),
        ))
        .expect_err("must fail");
    assert_eq!(
        messages(err),
        vec!["email does not have a valid value: not-an-email".to_string()]
    );
}

// =============================================================================
// SHARED STATE
// =============================================================================

#[test]
fn shared_state_reaches_store_and_document() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Cart", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::default())
        .expect("call");

    let document = response.document().expect("document");
    assert_eq!(document.state_value("qty"), Some(&Value::Int(3)));
    assert_eq!(
        fx.store.get("cart", "qty").expect("store"),
        Some(Value::Int(3))
    );
    assert_eq!(fx.store.is_persistent("cart", "qty"), Some(false));
    assert_eq!(fx.journal.len(), 1);

    // state is not rendered as a field
    assert!(document.field("qty").is_none());
    assert_eq!(document.links.get("self").map(|l| l.href.as_str()), Some("/cart?qty=3"));
}

#[test]
fn state_values_are_read_from_the_query() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Cart", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::new(Record::new(), record(&[("qty", Value::from("7"))])))
        .expect("call");
    let document = response.document().expect("document");
    assert_eq!(document.state_value("qty"), Some(&Value::Int(8)));
}

// =============================================================================
// STATUS AND LOCATION
// =============================================================================

#[test]
fn unsupported_status_is_fatal() {
    let fx = fixture();
    let err = fx
        .engine
        .create_resource("shop.Broken", Verb::Get, Default::default())
        .expect_err("must fail");
    assert!(matches!(
        err,
        TrellisError::UnsupportedVariantStatus { status: 418, .. }
    ));
}

#[test]
fn see_other_resolves_location() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Contact", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::new(
            record(&[("email", Value::from("a@b.com"))]),
            Record::new(),
        ))
        .expect("call");
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.location(), Some("/home"));
    assert!(response.document().is_none());
}

#[test]
fn unresolvable_location_is_internal() {
    let fx = fixture();
    let conditions = [("mode".to_string(), Value::from("lost"))].into_iter().collect();
    let err = fx
        .engine
        .create_resource("shop.Contact", Verb::Post, conditions)
        .expect("processor")
        .call(CallInput::new(
            record(&[("email", Value::from("a@b.com"))]),
            Record::new(),
        ))
        .expect_err("must fail");
    assert!(matches!(err, TrellisError::Internal(_)));
}

#[test]
fn verbs_outside_the_variant_are_rejected() {
    let fx = fixture();
    let err = fx
        .engine
        .create_resource("shop.Account", Verb::Post, Default::default())
        .expect_err("must fail");
    assert!(matches!(err, TrellisError::MethodNotAllowed(ref m) if m == "POST not allowed."));

    let err = fx
        .engine
        .create_root_resource(Verb::Delete, Default::default())
        .expect_err("must fail");
    assert!(matches!(err, TrellisError::MethodNotAllowed(_)));

    let err = fx
        .engine
        .create_resource("shop.Nowhere", Verb::Get, Default::default())
        .expect_err("must fail");
    assert!(matches!(err, TrellisError::NotFound(ref m) if m == "Resource shop.Nowhere not found."));
}

// =============================================================================
// LINKS AND ATTACHMENTS
// =============================================================================

#[test]
fn handler_links_are_resolved_or_dropped() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Cart", Verb::Post, Default::default())
        .expect("processor")
        .call(CallInput::default())
        .expect("call");
    let links = &response.document().expect("document").links;
    assert_eq!(links.get("contact").map(|l| l.href.as_str()), Some("/contact"));
    assert!(!links.contains_key("nowhere"));
}

#[test]
fn attached_resources_are_embedded() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Contact", Verb::Get, Default::default())
        .expect("processor")
        .call(CallInput::default())
        .expect("call");
    let document = response.document().expect("document");
    let cart = document.embedded.get("cart").expect("embedded cart");
    // attached resources carry no self link
    assert!(cart.links.get("self").is_none());
}

#[test]
fn attached_resources_must_be_ok() {
    let fx = fixture();
    let conditions = [("mode".to_string(), Value::from("lost"))].into_iter().collect();
    let err = fx
        .engine
        .create_resource("shop.Contact", Verb::Get, conditions)
        .expect("processor")
        .call(CallInput::default())
        .expect_err("must fail");
    assert!(
        matches!(err, TrellisError::Internal(ref m) if m == "Attached resources must return an OK status code.")
    );
}

#[test]
fn root_resource_and_root_link() {
    let fx = fixture();
    let response = fx
        .engine
        .create_root_resource(Verb::Get, Default::default())
        .expect("processor")
        .call(CallInput::default())
        .expect("call");
    let document = response.document().expect("document");
    assert_eq!(document.hints, vec!["Welcome".to_string()]);
    assert_eq!(document.data_value("title"), Some(&Value::from("Shop")));

    assert_eq!(fx.engine.create_link(None, &Record::new()).map(|l| l.href), Some("/".to_string()));
    assert!(fx.engine.create_link(Some("shop.Missing"), &Record::new()).is_none());
}

// =============================================================================
// RECONDITION
// =============================================================================

#[test]
fn recon_values_select_the_variant_before_the_call() {
    let fx = fixture();
    let processor = fx
        .engine
        .create_resource("shop.Account", Verb::Get, Default::default())
        .expect("processor");
    assert_eq!(processor.class(), "shop.Account");

    let response = processor
        .call(CallInput::new(Record::new(), record(&[("kind", Value::from("business"))])))
        .expect("call");
    let document = response.document().expect("document");
    let meta = document.meta.as_ref().expect("meta");
    assert_eq!(meta.get("kind"), Some(&Value::from("business")));
    // only the business variant declares vat
    assert!(document.field("vat").is_some());
    let link = document.links.get("self").expect("self link");
    assert_eq!(link.href, "/business-account{?kind,vat}");
    assert!(link.templated);
}

#[test]
fn recon_falls_back_when_the_value_does_not_match() {
    let fx = fixture();
    let response = fx
        .engine
        .create_resource("shop.Account", Verb::Get, Default::default())
        .expect("processor")
        .call(CallInput::new(Record::new(), record(&[("kind", Value::from("personal"))])))
        .expect("call");
    let document = response.document().expect("document");
    assert!(document.field("vat").is_none());
}
