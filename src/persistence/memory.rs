//! In-memory store.
//!
//! Backs tests and sessions that should not touch disk. Also the value map
//! behind [`JsonFileStore`](super::JsonFileStore).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use serde::{Serialize, Deserialize};

use super::{PersistenceError, PersistenceGateway};

/// A stored value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    /// Integer value
    Int(i64),
    /// String value
    Text(String),
    /// String set value
    TextSet(BTreeSet<String>),
}

/// Thread-safe map of stored values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<String, StoredValue>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with values.
    pub fn with_values(values: BTreeMap<String, StoredValue>) -> Self {
        Self {
            values: RwLock::new(values),
        }
    }

    /// Copy of every stored value.
    pub fn snapshot(&self) -> Result<BTreeMap<String, StoredValue>, PersistenceError> {
        Ok(self.read()?.clone())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredValue>>, PersistenceError> {
        self.values
            .read()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredValue>>, PersistenceError> {
        self.values
            .write()
            .map_err(|_| PersistenceError::Unavailable("store lock poisoned".into()))
    }

    fn put(&self, key: &str, value: StoredValue) -> Result<(), PersistenceError> {
        self.write()?.insert(key.to_string(), value);
        Ok(())
    }
}

fn mismatch(key: &str, expected: &'static str) -> PersistenceError {
    PersistenceError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl PersistenceGateway for MemoryStore {
    fn get_int(&self, key: &str, default: i64) -> Result<i64, PersistenceError> {
        match self.read()?.get(key) {
            None => Ok(default),
            Some(StoredValue::Int(v)) => Ok(*v),
            Some(_) => Err(mismatch(key, "an integer")),
        }
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), PersistenceError> {
        self.put(key, StoredValue::Int(value))
    }

    fn get_string(&self, key: &str, default: &str) -> Result<String, PersistenceError> {
        match self.read()?.get(key) {
            None => Ok(default.to_string()),
            Some(StoredValue::Text(v)) => Ok(v.clone()),
            Some(_) => Err(mismatch(key, "a string")),
        }
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.put(key, StoredValue::Text(value.to_string()))
    }

    fn get_string_set(
        &self,
        key: &str,
        default: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, PersistenceError> {
        match self.read()?.get(key) {
            None => Ok(default.clone()),
            Some(StoredValue::TextSet(v)) => Ok(v.clone()),
            Some(_) => Err(mismatch(key, "a string set")),
        }
    }

    fn set_string_set(&self, key: &str, value: &BTreeSet<String>) -> Result<(), PersistenceError> {
        self.put(key, StoredValue::TextSet(value.clone()))
    }
}
