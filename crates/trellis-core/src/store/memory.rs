//! In-memory shared store.

use crate::ports::SharedStore;
use crate::{TrellisError, Value};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    value: Value,
    persistent: bool,
}

/// Shared store backed by a `BTreeMap` behind an `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<BTreeMap<(String, String), Slot>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last write of `(pool, key)` asked for persistence.
    #[must_use]
    pub fn is_persistent(&self, pool: &str, key: &str) -> Option<bool> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(pool.to_string(), key.to_string()))
            .map(|slot| slot.persistent)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, pool: &str, key: &str) -> Result<Option<Value>, TrellisError> {
        Ok(self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(pool.to_string(), key.to_string()))
            .map(|slot| slot.value.clone()))
    }

    fn set(&self, pool: &str, key: &str, value: &Value, persistent: bool) -> Result<(), TrellisError> {
        tracing::trace!(pool, key, persistent, "shared store write");
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (pool.to_string(), key.to_string()),
                Slot {
                    value: value.clone(),
                    persistent,
                },
            );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let store = MemoryStore::new();
        store.set("cart", "qty", &Value::Int(1), false).expect("set");
        store.set("cart", "qty", &Value::Int(3), true).expect("set");

        assert_eq!(store.get("cart", "qty").expect("get"), Some(Value::Int(3)));
        assert_eq!(store.is_persistent("cart", "qty"), Some(true));
        assert_eq!(store.get("cart", "other").expect("get"), None);
        assert_eq!(store.get("wishlist", "qty").expect("get"), None);
        assert_eq!(store.len(), 1);
    }
}
