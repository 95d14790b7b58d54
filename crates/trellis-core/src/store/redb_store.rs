//! # redb-backed Shared Store
//!
//! Persistent values are written to a redb table keyed by `(pool, key)` and
//! encoded with postcard. Volatile values live in memory and shadow the disk
//! value until the next persistent write of the same key, so the last write
//! always wins regardless of persistence.
//!
//! postcard is not self-describing, so values are stored through a tagged
//! mirror of `Value` instead of its untagged serde form.

use crate::ports::SharedStore;
use crate::{Record, TrellisError, Value};
use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// Table for shared values: (pool, key) -> postcard encoded `StoredValue`
const SHARED: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("shared");

#[derive(Debug, Clone, Serialize, Deserialize)]
enum StoredValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<StoredValue>),
    Record(Vec<(String, StoredValue)>),
}

impl From<&Value> for StoredValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => Self::Float(*f),
            Value::String(s) => Self::String(s.clone()),
            Value::List(items) => Self::List(items.iter().map(Self::from).collect()),
            Value::Record(record) => Self::Record(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<StoredValue> for Value {
    fn from(stored: StoredValue) -> Self {
        match stored {
            StoredValue::Null => Self::Null,
            StoredValue::Bool(b) => Self::Bool(b),
            StoredValue::Int(i) => Self::Int(i),
            StoredValue::Float(f) => Self::Float(f),
            StoredValue::String(s) => Self::String(s),
            StoredValue::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
            StoredValue::Record(entries) => Self::Record(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect::<Record>(),
            ),
        }
    }
}

fn storage_error(e: impl std::fmt::Display) -> TrellisError {
    TrellisError::Storage(e.to_string())
}

/// Shared store persisted in a redb database.
pub struct RedbStore {
    db: Database,
    volatile: RwLock<BTreeMap<(String, String), Value>>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field(
                "volatile_entries",
                &self.volatile.read().unwrap_or_else(PoisonError::into_inner).len(),
            )
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(storage_error)?;
            let _ = write_txn.open_table(SHARED).map_err(storage_error)?;
            write_txn.commit().map_err(storage_error)?;
        }

        Ok(Self {
            db,
            volatile: RwLock::new(BTreeMap::new()),
        })
    }

    /// Number of values on disk.
    pub fn persistent_len(&self) -> Result<u64, TrellisError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(SHARED).map_err(storage_error)?;
        table.len().map_err(storage_error)
    }

    fn read_persistent(&self, pool: &str, key: &str) -> Result<Option<Value>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(SHARED).map_err(storage_error)?;
        match table.get((pool, key)).map_err(storage_error)? {
            Some(data) => {
                let stored: StoredValue = postcard::from_bytes(data.value())
                    .map_err(|e| TrellisError::Serialization(e.to_string()))?;
                Ok(Some(Value::from(stored)))
            }
            None => Ok(None),
        }
    }

    fn write_persistent(&self, pool: &str, key: &str, value: &Value) -> Result<(), TrellisError> {
        let bytes = postcard::to_allocvec(&StoredValue::from(value))
            .map_err(|e| TrellisError::Serialization(e.to_string()))?;
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut table = write_txn.open_table(SHARED).map_err(storage_error)?;
            table
                .insert((pool, key), bytes.as_slice())
                .map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)
    }
}

impl SharedStore for RedbStore {
    fn get(&self, pool: &str, key: &str) -> Result<Option<Value>, TrellisError> {
        let shadow = self
            .volatile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(pool.to_string(), key.to_string()))
            .cloned();
        match shadow {
            Some(value) => Ok(Some(value)),
            None => self.read_persistent(pool, key),
        }
    }

    fn set(&self, pool: &str, key: &str, value: &Value, persistent: bool) -> Result<(), TrellisError> {
        tracing::trace!(pool, key, persistent, "shared store write");
        let slot = (pool.to_string(), key.to_string());
        if persistent {
            self.write_persistent(pool, key, value)?;
            self.volatile
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&slot);
        } else {
            self.volatile
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(slot, value.clone());
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn persistent_values_survive_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("shared.redb");
        let nested = Value::record([
            ("sku", Value::from("A-1")),
            ("sizes", Value::List(vec![Value::Int(38), Value::Int(40)])),
        ]);
        {
            let store = RedbStore::open(&db_path).expect("open");
            store.set("cart", "item", &nested, true).expect("set");
            store.set("cart", "token", &Value::from("abc"), false).expect("set");
            assert_eq!(store.persistent_len().expect("len"), 1);
        }

        let store = RedbStore::open(&db_path).expect("reopen");
        assert_eq!(store.get("cart", "item").expect("get"), Some(nested));
        assert_eq!(store.get("cart", "token").expect("get"), None);
    }

    #[test]
    fn volatile_write_shadows_until_next_persistent_write() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("shared.redb")).expect("open");

        store.set("cart", "qty", &Value::Int(1), true).expect("set");
        store.set("cart", "qty", &Value::Int(2), false).expect("set");
        assert_eq!(store.get("cart", "qty").expect("get"), Some(Value::Int(2)));

        store.set("cart", "qty", &Value::Int(3), true).expect("set");
        assert_eq!(store.get("cart", "qty").expect("get"), Some(Value::Int(3)));
    }
}
