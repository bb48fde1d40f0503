//! StateStore — redb-backed object persistence.
//!
//! Objects are opaque JSON documents to the store, apart from
//! `metadata.resourceVersion`, which the store owns: every write takes the
//! next value of a store-wide counter in the same transaction. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use serde_json::Value;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// The resource version recorded in an object, empty when unset.
pub fn resource_version_of(value: &Value) -> &str {
    value
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .unwrap_or("")
}

fn set_resource_version(value: &mut Value, rv: u64) -> StateResult<()> {
    let metadata = value
        .as_object_mut()
        .ok_or_else(|| StateError::Invalid("object must be a JSON map".to_string()))?
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    let metadata = metadata
        .as_object_mut()
        .ok_or_else(|| StateError::Invalid("metadata must be a JSON map".to_string()))?;
    metadata.insert("resourceVersion".to_string(), Value::String(rv.to_string()));
    Ok(())
}

/// Thread-safe object store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Two handles are the same store when they share the database.
    pub fn same_store(&self, other: &StateStore) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }

    fn next_resource_version(txn: &WriteTransaction) -> StateResult<u64> {
        let mut table = txn.open_table(META).map_err(map_err!(Table))?;
        let current = table
            .get(RESOURCE_VERSION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table
            .insert(RESOURCE_VERSION_KEY, next)
            .map_err(map_err!(Write))?;
        Ok(next)
    }

    /// The last resource version issued by this store.
    pub fn current_resource_version(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(META).map_err(map_err!(Table))?;
        Ok(table
            .get(RESOURCE_VERSION_KEY)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    /// Insert a new object. Fails with `AlreadyExists` if `key` is taken.
    pub fn create(&self, key: &str, mut value: Value) -> StateResult<Value> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            if table.get(key).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(key.to_string()));
            }
            let rv = Self::next_resource_version(&txn)?;
            set_resource_version(&mut value, rv)?;
            let bytes = serde_json::to_vec(&value).map_err(map_err!(Serialize))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "object created");
        Ok(value)
    }

    /// Read-modify-write `key` atomically.
    ///
    /// `update` receives the stored object and returns its replacement; it may
    /// reject the update by returning an error, in which case nothing is
    /// written.
    pub fn guaranteed_update<F>(&self, key: &str, update: F) -> StateResult<Value>
    where
        F: FnOnce(Value) -> StateResult<Value>,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            let existing = table
                .get(key)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| StateError::NotFound(key.to_string()))?;
            let existing: Value =
                serde_json::from_slice(&existing).map_err(map_err!(Deserialize))?;

            let mut value = update(existing)?;
            let rv = Self::next_resource_version(&txn)?;
            set_resource_version(&mut value, rv)?;
            let bytes = serde_json::to_vec(&value).map_err(map_err!(Serialize))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
            updated = value;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "object updated");
        Ok(updated)
    }

    /// Get an object by key.
    pub fn get(&self, key: &str) -> StateResult<Option<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: Value =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// List all objects whose key starts with `prefix`, in key order.
    pub fn list(&self, prefix: &str) -> StateResult<Vec<Value>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(prefix) {
                break;
            }
            let value: Value =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(value);
        }
        Ok(results)
    }

    /// Delete an object by key, returning it if it existed.
    pub fn delete(&self, key: &str) -> StateResult<Option<Value>> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(OBJECTS).map_err(map_err!(Table))?;
            removed = table
                .remove(key)
                .map_err(map_err!(Write))?
                .map(|guard| guard.value().to_vec());
            if removed.is_some() {
                Self::next_resource_version(&txn)?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed = removed.is_some(), "object deleted");
        removed
            .map(|bytes| serde_json::from_slice(&bytes).map_err(map_err!(Deserialize)))
            .transpose()
    }
}
