//! # Demo Shop
//!
//! Application objects behind `definitions/shop.toml`. Classes without an
//! object here are served by `PlainObject`.

use trellis_core::{
    ClassRegistry, Journal, JournalEntry, Record, ResourceObject, Response, TrellisError, Value,
};

/// Register the shop objects.
pub fn register(classes: &mut ClassRegistry<()>) {
    classes
        .register_default::<Home>("shop.Home")
        .register_default::<Contact>("shop.Contact")
        .register_default::<Cart>("shop.Cart");
}

fn unknown_method(class: &str, method: &str) -> TrellisError {
    TrellisError::Handler(format!("{} has no method '{}'", class, method))
}

// =============================================================================
// HOME
// =============================================================================

/// Landing page. Embeds the cart and links to the contact form.
#[derive(Debug, Default)]
pub struct Home {
    attributes: Record,
}

impl ResourceObject<()> for Home {
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
                response.link("contact", "shop.Contact", Record::new());
                response.link("account", "shop.Account", Record::new());
                Ok(())
            }
            other => Err(unknown_method("shop.Home", other)),
        }
    }
}

// =============================================================================
// CONTACT
// =============================================================================

/// Contact form. A submission is journaled and redirects home.
#[derive(Debug, Default)]
pub struct Contact {
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
        journal: &dyn Journal,
        response: &mut Response,
        _deps: &(),
    ) -> Result<(), TrellisError> {
        match method {
            "show" => Ok(()),
            "submit" => {
                journal.record(
                    JournalEntry::now("shop.Contact", "submit", 303).with_status_text("See Other"),
                );
                response.set_location("shop.Home", Record::new());
                Ok(())
            }
            other => Err(unknown_method("shop.Contact", other)),
        }
    }
}

// =============================================================================
// CART
// =============================================================================

/// Cart with a shared quantity. `add` increments it by `amount`.
#[derive(Debug, Default)]
pub struct Cart {
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
            "show" => {
                if self.get("qty").is_null() {
                    self.set("qty", Value::Int(0));
                }
                Ok(())
            }
            "add" => {
                let qty = self.get("qty").as_i64().unwrap_or(0);
                let amount = self.get("amount").as_i64().unwrap_or(1);
                if amount <= 0 {
                    response.field_overrides("amount").required = true;
                    response.set_hints(vec!["Amount must be positive".to_string()]);
                    return Ok(());
                }
                self.set("qty", Value::Int(qty.saturating_add(amount)));
                journal.record(JournalEntry::now("shop.Cart", "add", 200));
                response.link("checkout", "shop.Contact", Record::new());
                Ok(())
            }
            other => Err(unknown_method("shop.Cart", other)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{MemoryJournal, Status};

    #[test]
    fn cart_adds_amount() {
        let journal = MemoryJournal::new();
        let mut response = Response::new(Status::Ok);
        let mut cart = Cart::default();
        cart.set("qty", Value::Int(2));
        cart.set("amount", Value::Int(3));

        cart.handle("add", &journal, &mut response, &()).expect("add");
        assert_eq!(cart.get("qty"), Value::Int(5));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn contact_submission_is_journaled() {
        let journal = MemoryJournal::new();
        let mut response = Response::new(Status::SeeOther);
        let mut contact = Contact::default();
        contact.set("email", Value::from("a@b.com"));

        contact.handle("submit", &journal, &mut response, &()).expect("submit");
        let entries = journal.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, 303);
        assert!(!entries[0].redacted);
        // the submitted address stays out of the journal
        assert_eq!(entries[0].status_text.as_deref(), Some("See Other"));
    }

    #[test]
    fn unknown_methods_fail() {
        let journal = MemoryJournal::new();
        let mut response = Response::new(Status::Ok);
        let err = Home::default()
            .handle("delete", &journal, &mut response, &())
            .expect_err("must fail");
        assert!(matches!(err, TrellisError::Handler(_)));
    }
}
