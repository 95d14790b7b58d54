//! # Link Builder
//!
//! Hypermedia references to resource variants.
//!
//! The path of a class strips the configured namespace, splits the rest on
//! `.` or `::` and kebab-cases every segment:
//! `shop.checkout.BillingAddress` with namespace `shop` becomes
//! `checkout/billing-address`.
//!
//! Meta and state values become the query string in descriptor order. Meta
//! fields without a value are appended as an RFC 6570 form-query expression
//! and mark the link templated.

use crate::Record;
use crate::variant::Variant;
use heck::ToKebabCase;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// A hypermedia reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub templated: bool,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            templated: false,
        }
    }
}

/// Builds links below a base path.
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    base_path: String,
    namespace: String,
}

impl LinkBuilder {
    pub fn new(base_path: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Path of `class` relative to the base path, without leading slash.
    #[must_use]
    pub fn path(&self, class: &str) -> String {
        let local = if self.namespace.is_empty() {
            class
        } else {
            class
                .strip_prefix(self.namespace.as_str())
                .and_then(|rest| rest.strip_prefix("::").or_else(|| rest.strip_prefix('.')))
                .unwrap_or(class)
        };
        local
            .split("::")
            .flat_map(|part| part.split('.'))
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_kebab_case())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Link to the base path itself.
    #[must_use]
    pub fn root(&self) -> Link {
        if self.base_path.is_empty() {
            Link::new("/")
        } else {
            Link::new(self.base_path.clone())
        }
    }

    /// Link to `variant`, carrying the meta and state values in `values`.
    #[must_use]
    pub fn build(&self, variant: &Variant, values: &Record) -> Link {
        let mut href = format!("{}/{}", self.base_path, self.path(variant.class()));
        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        let mut unbound: Vec<&str> = Vec::new();

        for field in variant.fields() {
            if !field.flags.is_meta() && !field.flags.is_state() {
                continue;
            }
            match values.get(&field.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    query.append_pair(&field.name, &value.to_string());
                    has_query = true;
                }
                None if field.flags.is_meta() => unbound.push(&field.name),
                None => {}
            }
        }

        if has_query {
            href.push('?');
            href.push_str(&query.finish());
        }
        let templated = !unbound.is_empty();
        if templated {
            let operator = if has_query { '&' } else { '?' };
            href.push_str(&format!("{{{}{}}}", operator, unbound.join(",")));
        }
        Link { href, templated }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, Schema};
    use crate::variant::{VariantDef, VerbSpec};
    use crate::{FieldFlags, Value, Verb};
    use std::sync::Arc;

    fn variant(class: &str) -> Variant {
        let mut schema = Schema::new();
        let table = schema
            .add(vec![
                FieldDescriptor::scalar("page", "integer").with_flags(FieldFlags::META),
                FieldDescriptor::scalar("q", "string").with_flags(FieldFlags::META),
                FieldDescriptor::scalar("token", "string").with_flags(FieldFlags::STATE),
                FieldDescriptor::scalar("title", "string"),
            ])
            .expect("table");
        Variant::new(
            Arc::new(schema),
            VariantDef::new(class, table).verb(Verb::Get, VerbSpec::new("show")),
        )
        .expect("variant")
    }

    #[test]
    fn path_strips_namespace_and_kebab_cases() {
        let links = LinkBuilder::new("/api/", "shop");
        assert_eq!(links.path("shop.checkout.BillingAddress"), "checkout/billing-address");
        assert_eq!(links.path("shop::ProductList"), "product-list");
        assert_eq!(links.path("other.ProductList"), "other/product-list");
        assert_eq!(links.path("shopping.Cart"), "shopping/cart");
        assert_eq!(links.base_path(), "/api");
    }

    #[test]
    fn values_become_query_in_descriptor_order() {
        let links = LinkBuilder::new("/api", "shop");
        let values: Record = [
            ("token", Value::from("a b")),
            ("q", Value::from("shoes")),
            ("page", Value::Int(2)),
            ("title", Value::from("ignored")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let link = links.build(&variant("shop.ProductList"), &values);
        assert_eq!(link.href, "/api/product-list?page=2&q=shoes&token=a+b");
        assert!(!link.templated);
    }

    #[test]
    fn unbound_meta_fields_make_templated_links() {
        let links = LinkBuilder::new("/api", "shop");
        let link = links.build(&variant("shop.ProductList"), &Record::new());
        assert_eq!(link.href, "/api/product-list{?page,q}");
        assert!(link.templated);

        let mut values = Record::new();
        values.insert("page".into(), Value::Int(1));
        let link = links.build(&variant("shop.ProductList"), &values);
        assert_eq!(link.href, "/api/product-list?page=1{&q}");
    }

    #[test]
    fn root_link() {
        assert_eq!(LinkBuilder::new("", "").root().href, "/");
        assert_eq!(LinkBuilder::new("/api", "").root().href, "/api");
    }

    #[test]
    fn templated_flag_serializes_only_when_set() {
        let json = serde_json::to_string(&Link::new("/api")).expect("serialize");
        assert_eq!(json, r#"{"href":"/api"}"#);
    }
}
