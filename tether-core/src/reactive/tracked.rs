//! Tracked Records
//!
//! A [`Tracked`] handle wraps a plain [`Record`] and routes every property
//! access through the runtime.
//!
//! # How Tracking Works
//!
//! 1. A read inside an effect subscribes that effect to the `(record, key)`
//!    pair, then returns the current value. Outside any effect the read is a
//!    plain read.
//!
//! 2. A write stores the new value first and only then dispatches, so every
//!    effect that re-runs observes the new value.
//!
//! Missing keys are tracked like any other key. An effect that reads a key
//! before it exists re-runs once the key is written.
//!
//! # Lifetime
//!
//! The runtime keeps nothing but the record's [`TargetId`]. When the last
//! handle is dropped, the runtime forgets every subscription recorded against
//! that ID.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::id::TargetId;
use super::record::{JsonRecord, Record};
use super::runtime::Runtime;
use crate::error::{ReactiveError, Result};

/// A record whose reads and writes are tracked by a [`Runtime`].
///
/// Cloning a `Tracked` creates a new handle to the **same** record.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = runtime.wrap(IndexMap::from([("count".to_string(), 0)]));
///
/// // Read the value
/// let value = state.get("count");
///
/// // Update the value (re-runs subscribed effects)
/// state.set("count", 5);
/// ```
pub struct Tracked<R: Record> {
    inner: Arc<TrackedInner<R>>,
}

struct TrackedInner<R> {
    id: TargetId,
    record: RwLock<R>,
    runtime: Runtime,
}

impl<R: Record> Tracked<R> {
    pub(crate) fn new(runtime: Runtime, record: R) -> Self {
        Self {
            inner: Arc::new(TrackedInner {
                id: TargetId::new(),
                record: RwLock::new(record),
                runtime,
            }),
        }
    }

    /// Get the record's identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// The runtime this record is tracked by.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Get the value stored under `key`.
    ///
    /// If called while an effect of this record's runtime is running, this
    /// also subscribes that effect to `key`. Effects of other runtimes are
    /// not consulted: a read from inside one of them is an untracked read.
    pub fn get(&self, key: &str) -> Option<R::Value> {
        self.inner.runtime.track(self.inner.id, key);
        self.get_untracked(key)
    }

    /// Get the value stored under `key` without tracking.
    pub fn get_untracked(&self, key: &str) -> Option<R::Value> {
        let record = self.inner.record.read();
        record.read(key)
    }

    /// Store `value` under `key`, then re-run every effect subscribed to it.
    ///
    /// Effects run synchronously; they have all finished when this returns.
    /// Always returns `true`.
    pub fn set(&self, key: &str, value: R::Value) -> bool {
        {
            let mut record = self.inner.record.write();
            record.write(key, value);
        }

        self.inner.runtime.trigger(self.inner.id, key);
        true
    }

    /// Update the value under `key` using a function of the current value.
    ///
    /// The current value is read without tracking.
    pub fn update<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(Option<R::Value>) -> R::Value,
    {
        let value = f(self.get_untracked(key));
        self.set(key, value)
    }

    /// Borrow the whole record without tracking.
    ///
    /// The record stays locked for the duration of `f`; writing to this
    /// record from inside `f` deadlocks.
    pub fn with<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.inner.record.read())
    }

    /// Clone the whole record without tracking.
    pub fn snapshot(&self) -> R
    where
        R: Clone,
    {
        self.inner.record.read().clone()
    }
}

impl Tracked<JsonRecord> {
    /// Get the value under `key` decoded as `T`.
    ///
    /// Tracks like [`get`](Tracked::get). Returns `Ok(None)` for a missing key.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|value| {
                serde_json::from_value::<T>(value).map_err(|source| ReactiveError::Decode {
                    key: key.to_owned(),
                    source,
                })
            })
            .transpose()
    }

    /// Encode `value` and store it under `key` like [`set`](Tracked::set).
    pub fn set_from<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value).map_err(|source| ReactiveError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.set(key, value);
        Ok(())
    }

    /// The whole record as a JSON object, without tracking.
    pub fn to_value(&self) -> Value {
        Value::Object(self.snapshot())
    }
}

impl<R: Record> Clone for Tracked<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record> fmt::Debug for Tracked<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.inner.id)
            .field("runtime", &self.inner.runtime.label())
            .finish()
    }
}

impl<R> Drop for TrackedInner<R> {
    fn drop(&mut self) {
        self.runtime.release(self.id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn tracked_get_and_set() {
        let runtime = Runtime::new();
        let state = runtime.wrap(IndexMap::from([("count".to_string(), 0)]));
        assert_eq!(state.get("count"), Some(0));

        assert!(state.set("count", 42));
        assert_eq!(state.get("count"), Some(42));
    }

    #[test]
    fn tracked_update() {
        let runtime = Runtime::new();
        let state = runtime.wrap(IndexMap::from([("count".to_string(), 10)]));
        state.update("count", |v| v.unwrap_or_default() + 5);
        assert_eq!(state.get("count"), Some(15));

        state.update("fresh", |v| v.unwrap_or(1));
        assert_eq!(state.get("fresh"), Some(1));
    }

    #[test]
    fn tracked_clone_shares_state() {
        let runtime = Runtime::new();
        let state1 = runtime.wrap_json(json!({ "a": 0 })).unwrap();
        let state2 = state1.clone();

        state1.set("a", json!(42));
        assert_eq!(state2.get("a"), Some(json!(42)));
        assert_eq!(state1.id(), state2.id());
    }

    #[test]
    fn tracked_ids_are_unique() {
        let runtime = Runtime::new();
        let s1 = runtime.wrap_json(json!({})).unwrap();
        let s2 = runtime.wrap_json(json!({})).unwrap();

        assert_ne!(s1.id(), s2.id());
    }

    #[test]
    fn write_is_applied_before_dispatch() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1 })).unwrap();
        let observed = Arc::new(AtomicI32::new(0));

        let state_clone = state.clone();
        let observed_clone = observed.clone();
        let _effect = runtime.effect(move || {
            let value = state_clone.get_as::<i32>("a").unwrap().unwrap_or(-1);
            observed_clone.store(value, Ordering::SeqCst);
        });

        state.set("a", json!(7));
        assert_eq!(observed.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn missing_keys_are_tracked() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({})).unwrap();
        let runs = Arc::new(AtomicI32::new(0));

        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let _effect = runtime.effect(move || {
            state_clone.get("later");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("later", json!(true));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_last_handle_releases_target() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1 })).unwrap();
        let id = state.id();

        let reader = state.clone();
        let effect = runtime.effect(move || {
            reader.get("a");
        });
        assert_eq!(runtime.subscribed_keys(id), 1);

        // The effect's closure still holds a handle.
        drop(state);
        assert_eq!(runtime.subscribed_keys(id), 1);

        drop(effect);
        assert_eq!(runtime.target_count(), 0);
    }

    #[test]
    fn typed_helpers_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({})).unwrap();

        state.set_from("origin", &Point { x: 1, y: 2 }).unwrap();
        assert_eq!(
            state.get_as::<Point>("origin").unwrap(),
            Some(Point { x: 1, y: 2 })
        );
        assert_eq!(state.get_as::<Point>("missing").unwrap(), None);
    }

    #[test]
    fn decode_failure_names_the_key() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "n": "not a number" })).unwrap();

        let err = state.get_as::<u32>("n").unwrap_err();
        assert!(matches!(err, ReactiveError::Decode { ref key, .. } if key == "n"));
    }

    #[test]
    fn snapshot_and_with_do_not_track() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1, "b": 2 })).unwrap();

        let reader = state.clone();
        let _effect = runtime.effect(move || {
            let len = reader.with(|record| record.len());
            assert_eq!(len, 2);
            reader.to_value();
        });

        assert!(runtime.is_quiescent());
        assert_eq!(state.to_value(), json!({ "a": 1, "b": 2 }));
    }
}
