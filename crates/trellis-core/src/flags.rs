//! # Field Flags
//!
//! Per-field attributes as a fixed-width bitmask. The bit values are part of
//! the definition format and must not be renumbered.
//!
//! Groups:
//! - validation: `REQUIRED`, `READONLY`, `DISABLED`
//! - shape: `ARRAY`, `MATRIX`, `MULTIPLE`
//! - placement: `META`, `DATA`, `STATE`, `PRIVATE`
//! - behavior: `RECON`, `LOOKUP`, `AUTOSUBMIT`
//! - visibility/presentation: `SHARED`, `HIDDEN`, `INPUT`, `NO_INPUT`

use crate::{Record, TrellisError, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags::bitflags! {
    /// Attributes of a single field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u32 {
        /// The field must have a value.
        const REQUIRED   = 1;
        /// Server owned, clients may not submit it.
        const READONLY   = 2;
        /// Rendered but not accepted.
        const DISABLED   = 4;
        /// Comma separated list of scalars (e.g. several emails).
        const MULTIPLE   = 8;
        /// Array of the field type.
        const ARRAY      = 16;
        /// Part of the URI; makes links templated.
        const META       = 32;
        /// Claims the whole data section.
        const DATA       = 64;
        /// Embedded in links, hidden from the client.
        const STATE      = 128;
        /// Changing the value may change the resource variant.
        const RECON      = 256;
        /// Changing the value triggers a lookup.
        const LOOKUP     = 512;
        /// Two dimensional array of the field type.
        const MATRIX     = 1024;
        const AUTOSUBMIT = 2048;
        /// Value is mirrored in the shared store under the field's pool.
        const SHARED     = 4096;
        /// Never leaves the server except through the shared store.
        const PRIVATE    = 16384;
        const HIDDEN     = 32768;
        const INPUT      = 65536;
        const NO_INPUT   = 131072;
    }
}

/// Where a field's value ends up in the response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    State,
    Private,
    Meta,
    Data,
    Plain,
}

/// Flag overrides a handler can force on for a single response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOverrides {
    pub required: bool,
    pub readonly: bool,
    pub disabled: bool,
}

/// Display order and names, also accepted by `FieldFlags::parse_name`.
const NAMED: [(&str, FieldFlags); 17] = [
    ("private", FieldFlags::PRIVATE),
    ("hidden", FieldFlags::HIDDEN),
    ("state", FieldFlags::STATE),
    ("meta", FieldFlags::META),
    ("data", FieldFlags::DATA),
    ("required", FieldFlags::REQUIRED),
    ("readonly", FieldFlags::READONLY),
    ("shared", FieldFlags::SHARED),
    ("disabled", FieldFlags::DISABLED),
    ("multiple", FieldFlags::MULTIPLE),
    ("array", FieldFlags::ARRAY),
    ("recon", FieldFlags::RECON),
    ("lookup", FieldFlags::LOOKUP),
    ("matrix", FieldFlags::MATRIX),
    ("autosubmit", FieldFlags::AUTOSUBMIT),
    ("input", FieldFlags::INPUT),
    ("no-input", FieldFlags::NO_INPUT),
];

impl FieldFlags {
    #[must_use]
    pub const fn is_required(self) -> bool {
        self.contains(Self::REQUIRED)
    }

    #[must_use]
    pub const fn is_readonly(self) -> bool {
        self.contains(Self::READONLY)
    }

    #[must_use]
    pub const fn is_disabled(self) -> bool {
        self.contains(Self::DISABLED)
    }

    #[must_use]
    pub const fn is_multiple(self) -> bool {
        self.contains(Self::MULTIPLE)
    }

    #[must_use]
    pub const fn is_array(self) -> bool {
        self.contains(Self::ARRAY)
    }

    #[must_use]
    pub const fn is_matrix(self) -> bool {
        self.contains(Self::MATRIX)
    }

    #[must_use]
    pub const fn is_meta(self) -> bool {
        self.contains(Self::META)
    }

    #[must_use]
    pub const fn is_data(self) -> bool {
        self.contains(Self::DATA)
    }

    #[must_use]
    pub const fn is_state(self) -> bool {
        self.contains(Self::STATE)
    }

    #[must_use]
    pub const fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    #[must_use]
    pub const fn is_recon(self) -> bool {
        self.contains(Self::RECON)
    }

    #[must_use]
    pub const fn is_lookup(self) -> bool {
        self.contains(Self::LOOKUP)
    }

    #[must_use]
    pub const fn is_autosubmit(self) -> bool {
        self.contains(Self::AUTOSUBMIT)
    }

    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.contains(Self::SHARED)
    }

    #[must_use]
    pub const fn is_hidden(self) -> bool {
        self.contains(Self::HIDDEN)
    }

    #[must_use]
    pub const fn is_input(self) -> bool {
        self.contains(Self::INPUT)
    }

    #[must_use]
    pub const fn is_no_input(self) -> bool {
        self.contains(Self::NO_INPUT)
    }

    /// Placement by precedence `state > private > meta > data > plain`.
    #[must_use]
    pub const fn placement(self) -> Placement {
        if self.is_state() {
            Placement::State
        } else if self.is_private() {
            Placement::Private
        } else if self.is_meta() {
            Placement::Meta
        } else if self.is_data() {
            Placement::Data
        } else {
            Placement::Plain
        }
    }

    /// Number of placement flags set. More than one is rejected at load time.
    #[must_use]
    pub fn placement_count(self) -> u32 {
        (self & (Self::META | Self::DATA | Self::STATE | Self::PRIVATE))
            .bits()
            .count_ones()
    }

    /// State and private fields never reach the client.
    #[must_use]
    pub const fn is_hidden_from_client(self) -> bool {
        self.is_state() || self.is_private()
    }

    /// Parse one flag name as printed by `Display`.
    ///
    /// Matching is case-insensitive; `noInput` and `no_input` are accepted too.
    pub fn parse_name(name: &str) -> Result<Self, TrellisError> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        let normalized = if normalized == "noinput" {
            "no-input".to_string()
        } else {
            normalized
        };
        NAMED
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, f)| *f)
            .ok_or_else(|| TrellisError::InvalidDefinition(format!("Unknown field flag '{}'", name)))
    }

    /// Parse a list of flag names into one set.
    pub fn parse_names<S: AsRef<str>>(names: &[S]) -> Result<Self, TrellisError> {
        names
            .iter()
            .try_fold(Self::empty(), |acc, n| -> Result<Self, TrellisError> {
                Ok(acc | Self::parse_name(n.as_ref())?)
            })
    }

    /// Write every true attribute onto a field schema record.
    ///
    /// False attributes are never written. Overrides can force
    /// required/readonly/disabled on. Fails for state and private fields.
    pub fn emit_meta(self, target: &mut Record, overrides: FieldOverrides) -> Result<(), TrellisError> {
        if self.is_hidden_from_client() {
            return Err(TrellisError::IllegalFieldVisibility(
                "State or private fields should not be visible to the client.".to_string(),
            ));
        }
        let attributes = [
            ("required", self.is_required() || overrides.required),
            ("readonly", self.is_readonly() || overrides.readonly),
            ("disabled", self.is_disabled() || overrides.disabled),
            ("multiple", self.is_multiple()),
            ("array", self.is_array()),
            ("meta", self.is_meta()),
            ("data", self.is_data()),
            ("recon", self.is_recon()),
            ("lookup", self.is_lookup()),
            ("matrix", self.is_matrix()),
            ("autosubmit", self.is_autosubmit()),
            ("hidden", self.is_hidden()),
            ("input", self.is_input()),
            ("noInput", self.is_no_input()),
        ];
        for (name, on) in attributes {
            if on {
                target.insert(name.to_string(), Value::Bool(true));
            }
        }
        Ok(())
    }
}

impl fmt::Display for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = NAMED
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(n, _)| *n)
            .collect();
        f.write_str(&names.join(" "))
    }
}

// =============================================================================
// TESTS
// =============================================================================
