//! Plain data records.
//!
//! A [`Record`] is the untracked storage behind a [`Tracked`](super::Tracked)
//! handle. It exposes a keyed read and a keyed write and knows nothing about
//! effects; interception happens entirely in the wrapper.

use std::collections::HashMap;
use std::hash::BuildHasher;

use indexmap::IndexMap;
use serde_json::Value;

/// A JSON object used as a record.
pub type JsonRecord = serde_json::Map<String, Value>;

/// Keyed read/write access to a plain data record.
pub trait Record: Send + Sync + 'static {
    /// The type of a single property value.
    type Value: Clone + Send + Sync + 'static;

    /// Read the value stored under `key`, if any.
    fn read(&self, key: &str) -> Option<Self::Value>;

    /// Store `value` under `key`, inserting the key if it is new.
    fn write(&mut self, key: &str, value: Self::Value);
}

impl Record for JsonRecord {
    type Value = Value;

    fn read(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: Value) {
        self.insert(key.to_owned(), value);
    }
}

impl<V, S> Record for IndexMap<String, V, S>
where
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    type Value = V;

    fn read(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: V) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.insert(key.to_owned(), value);
            }
        }
    }
}

impl<V, S> Record for HashMap<String, V, S>
where
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Send + Sync + 'static,
{
    type Value = V;

    fn read(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: V) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                self.insert(key.to_owned(), value);
            }
        }
    }
}
