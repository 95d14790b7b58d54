//! # Resource Objects
//!
//! The application objects resources are rendered from. An object exposes
//! its attributes by name and runs one handler method per call. The method
//! name comes from the resolved variant, so dispatch goes through a plain
//! string match in `handle` instead of reflection.
//!
//! Objects are created through the `ClassRegistry`, keyed by the class
//! identity a variant names.

use crate::ports::Journal;
use crate::response::Response;
use crate::{Record, TrellisError, Value};
use std::collections::BTreeMap;
use std::fmt;

/// An application object backing a resource.
///
/// `D` is the application's dependency container, passed through to
/// handlers untouched.
pub trait ResourceObject<D>: Send {
    /// Current value of an attribute. Unset attributes are `Null`.
    fn get(&self, name: &str) -> Value;

    fn set(&mut self, name: &str, value: Value);

    /// Snapshot of every attribute.
    fn attributes(&self) -> Record;

    /// Run the handler `method`.
    fn handle(
        &mut self,
        method: &str,
        journal: &dyn Journal,
        response: &mut Response,
        deps: &D,
    ) -> Result<(), TrellisError>;
}

/// Object that only stores its attributes.
///
/// Every handler method succeeds without side effects, which is what
/// read-only resources need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlainObject {
    attributes: Record,
}

impl PlainObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D> ResourceObject<D> for PlainObject {
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
        _response: &mut Response,
        _deps: &D,
    ) -> Result<(), TrellisError> {
        tracing::trace!(method, "plain object handler");
        Ok(())
    }
}

type Factory<D> = Box<dyn Fn() -> Box<dyn ResourceObject<D>> + Send + Sync>;

/// Object factories by class identity.
pub struct ClassRegistry<D> {
    factories: BTreeMap<String, Factory<D>>,
}

impl<D> Default for ClassRegistry<D> {
    fn default() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }
}

impl<D> fmt::Debug for ClassRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<D: 'static> ClassRegistry<D> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `class`.
    pub fn register<F>(&mut self, class: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ResourceObject<D>> + Send + Sync + 'static,
    {
        self.factories.insert(class.into(), Box::new(factory));
        self
    }

    /// Register `T::default()` as the factory for `class`.
    pub fn register_default<T>(&mut self, class: impl Into<String>) -> &mut Self
    where
        T: ResourceObject<D> + Default + 'static,
    {
        self.register(class, || -> Box<dyn ResourceObject<D>> { Box::new(T::default()) })
    }

    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.factories.contains_key(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// A fresh object of `class`.
    pub fn instantiate(&self, class: &str) -> Result<Box<dyn ResourceObject<D>>, TrellisError> {
        self.factories
            .get(class)
            .map(|factory| factory())
            .ok_or_else(|| TrellisError::Configuration(format!("Class '{}' is not registered", class)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
