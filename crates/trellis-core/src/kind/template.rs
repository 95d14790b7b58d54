//! URI template kind.
//!
//! A string field whose metadata carries a link. The link is an RFC 6570
//! level 3 subset (`{var}`, `{?a,b}`, `{&a,b}`) expanded from the state
//! values accumulated for the response. Expressions that cannot be fully
//! expanded are kept and the link is marked templated.

use super::ScalarKind;
use crate::{Record, Value};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use url::form_urlencoded;

static EXPRESSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([?&]?)([A-Za-z0-9_.,]+)\}").ok());

fn encode(value: &Value) -> String {
    form_urlencoded::byte_serialize(value.to_string().as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Expand `template` with `values`.
///
/// Returns the expanded text and whether every expression was resolved.
pub fn expand_template(template: &str, values: &Record) -> (String, bool) {
    let Some(expression) = EXPRESSION.as_ref() else {
        return (template.to_string(), false);
    };
    let mut complete = true;
    let expanded = expression.replace_all(template, |caps: &Captures| {
        let operator = &caps[1];
        let names: Vec<&str> = caps[2].split(',').filter(|n| !n.is_empty()).collect();
        let lookup = |name: &str| values.get(name).filter(|v| !v.is_null());

        if operator.is_empty() {
            let rendered: Vec<String> = names
                .iter()
                .filter_map(|n| lookup(*n).map(encode))
                .collect();
            if rendered.len() == names.len() {
                return rendered.join(",");
            }
            complete = false;
            return caps[0].to_string();
        }

        let pairs: Vec<String> = names
            .iter()
            .filter_map(|n| lookup(*n).map(|v| format!("{}={}", n, encode(v))))
            .collect();
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| lookup(*n).is_none())
            .collect();

        let mut out = String::new();
        if !pairs.is_empty() {
            out.push_str(operator);
            out.push_str(&pairs.join("&"));
        }
        if !missing.is_empty() {
            complete = false;
            let continuation = if pairs.is_empty() { operator } else { "&" };
            out.push_str(&format!("{{{}{}}}", continuation, missing.join(",")));
        }
        out
    });
    (expanded.into_owned(), complete)
}

/// Registered under `name`, linking through `template`.
#[derive(Debug, Clone)]
pub struct UriTemplateKind {
    name: String,
    template: String,
}

impl UriTemplateKind {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }
}

impl ScalarKind for UriTemplateKind {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        value.as_str().map(|s| Value::from(s.trim()))
    }

    fn emit_meta(&self, target: &mut Record, state: &Record) {
        let (href, complete) = expand_template(&self.template, state);
        target.insert("type".to_string(), Value::from(self.name.as_str()));
        target.insert("href".to_string(), Value::String(href));
        if !complete {
            target.insert("templated".to_string(), Value::Bool(true));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
