//! # trellis-core
//!
//! The hypermedia resource engine for Trellis - THE LOGIC.
//!
//! A resource is a plain application object plus a declarative definition:
//! a table of typed, flagged fields and the handler method each verb runs.
//! The engine resolves the definition variant that matches the current
//! conditions, coerces submitted values onto the object, runs the handler
//! and renders the object back into a hypermedia document with links,
//! field schemas and embedded resources.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async and NO network dependencies
//! - Reaches every collaborator (definition cache, shared store,
//!   translator, deserializer, journal) through a trait in `ports`
//! - Is deterministic: ordered maps everywhere, cascades bounded by
//!   `MAX_CASCADE_ITERATIONS`, nesting bounded by `MAX_NESTING_DEPTH`

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod flags;
pub mod kind;
pub mod link;
pub mod object;
pub mod ports;
pub mod primitives;
pub mod processor;
pub mod response;
pub mod schema;
pub mod store;
pub mod types;
pub mod variant;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Conditions, Record, TrellisError, ValidationFailure, Value, Verb, merge_conditions};

// =============================================================================
// RE-EXPORTS: Definitions
// =============================================================================

pub use catalog::{Catalog, CatalogBuilder};
pub use flags::{FieldFlags, FieldOverrides, Placement};
pub use kind::{FieldType, ScalarKind, TypeRegistry, UriTemplateKind};
pub use schema::{FieldDescriptor, Schema, TableId, TypeRef};
pub use variant::{Variant, VariantDef, VerbSpec};

// =============================================================================
// RE-EXPORTS: Processing
// =============================================================================

pub use link::{Link, LinkBuilder};
pub use object::{ClassRegistry, PlainObject, ResourceObject};
pub use ports::{
    DefinitionCache, Deserializer, Journal, JournalEntry, MemoryJournal, NullJournal,
    PlaceholderTranslator, Shape, SharedStore, Translator, TypedDeserializer,
};
pub use processor::{CallInput, Engine, EngineBuilder, EngineConfig, Processor};
pub use response::{Document, Response, Status};
pub use store::{MemoryStore, RedbStore};
