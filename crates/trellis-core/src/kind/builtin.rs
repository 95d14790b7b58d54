//! Builtin scalar kinds.
//!
//! Query strings only carry text, so every kind also accepts the textual
//! form of its values and normalizes it.

use super::ScalarKind;
use crate::Value;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s,]+@[^@\s,.]+(\.[^@\s,.]+)+$").ok());

/// Any text. Numbers and booleans are accepted in their textual form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringKind;

impl ScalarKind for StringKind {
    fn name(&self) -> &str {
        "string"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        match value {
            Value::String(_) => Some(value.clone()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Some(Value::String(value.to_string())),
            _ => None,
        }
    }
}

/// Multi-line text with normalized line endings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextKind;

impl ScalarKind for TextKind {
    fn name(&self) -> &str {
        "text"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        value
            .as_str()
            .map(|s| Value::String(s.replace("\r\n", "\n").replace('\r', "\n")))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerKind;

impl ScalarKind for IntegerKind {
    fn name(&self) -> &str {
        "integer"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Int(_) => Some(value.clone()),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
            _ => None,
        }
    }
}

/// Integers stay integers, everything else becomes a finite float.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberKind;

impl ScalarKind for NumberKind {
    fn name(&self) -> &str {
        "number"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Int(_) => Some(value.clone()),
            Value::Float(f) if f.is_finite() => Some(value.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Some(Value::Int(i));
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Value::Float)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanKind;

impl ScalarKind for BooleanKind {
    fn name(&self) -> &str {
        "boolean"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Bool(_) => Some(value.clone()),
            Value::Int(0) => Some(Value::Bool(false)),
            Value::Int(1) => Some(Value::Bool(true)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "off" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Single address; use the `multiple` flag for lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailKind;

impl ScalarKind for EmailKind {
    fn name(&self) -> &str {
        "email"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        let trimmed = value.as_str()?.trim();
        let valid = EMAIL.as_ref().is_some_and(|re| re.is_match(trimmed));
        valid.then(|| Value::from(trimmed))
    }
}

/// Absolute URL, normalized by the `url` parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlKind;

impl ScalarKind for UrlKind {
    fn name(&self) -> &str {
        "url"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        let parsed = url::Url::parse(value.as_str()?.trim()).ok()?;
        Some(Value::String(parsed.into()))
    }
}

/// Calendar date as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateKind;

impl DateKind {
    const FORMAT: &'static str = "%Y-%m-%d";
}

impl ScalarKind for DateKind {
    fn name(&self) -> &str {
        "date"
    }

    fn validate(&self, value: &Value) -> Option<Value> {
        let date = NaiveDate::parse_from_str(value.as_str()?.trim(), Self::FORMAT).ok()?;
        Some(Value::String(date.format(Self::FORMAT).to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
