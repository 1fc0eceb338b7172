//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects tracked records and
//! effects. It owns the subscription store and the active-effect stacks, and
//! it is passed around explicitly: every [`Tracked`] record and every
//! [`Effect`] belongs to exactly one runtime. Independent runtimes never see
//! each other's effects.
//!
//! # How It Works
//!
//! 1. When an effect runs, the runtime pushes it onto the calling thread's
//!    active-effect stack.
//!
//! 2. When a tracked record is read, the runtime subscribes the effect on top
//!    of the stack to that `(record, key)` pair.
//!
//! 3. When a tracked record is written, the runtime:
//!    a. Takes a snapshot of the subscribers of that pair
//!    b. Skips every effect that is already on the stack
//!    c. Re-runs the rest in subscription order, synchronously
//!
//! # Thread Safety
//!
//! The store sits behind a mutex and each thread gets its own stack. Neither
//! lock is held while an effect body runs, so effects are free to read, write
//! and register further effects.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::context::{ActiveStacks, ContextGuard, Frame};
use super::effect::{Effect, EffectInner};
use super::id::{EffectId, TargetId};
use super::record::{JsonRecord, Record};
use super::store::{Dependency, SubscriptionStore};
use super::tracked::Tracked;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};

/// Handle to a reactive runtime.
///
/// Cloning a `Runtime` creates a new handle to the **same** runtime.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = runtime.wrap_json(json!({ "count": 0 }))?;
///
/// let _effect = runtime.effect({
///     let state = state.clone();
///     move || println!("count = {:?}", state.get("count"))
/// });
///
/// state.set("count", json!(1)); // prints "count = Some(Number(1))"
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    store: Mutex<SubscriptionStore<EffectInner>>,
    stacks: ActiveStacks<EffectInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::from_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                store: Mutex::new(SubscriptionStore::new()),
                stacks: ActiveStacks::new(),
            }),
        }
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// The label attached to this runtime's log events.
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Wrap a plain record so that reads and writes are tracked.
    pub fn wrap<R: Record>(&self, record: R) -> Tracked<R> {
        Tracked::new(self.clone(), record)
    }

    /// Wrap a JSON object.
    ///
    /// Fails with [`ReactiveError::NotARecord`] for anything but an object.
    pub fn wrap_json(&self, value: Value) -> Result<Tracked<JsonRecord>> {
        match value {
            Value::Object(record) => Ok(self.wrap(record)),
            other => Err(ReactiveError::NotARecord {
                found: json_kind(&other),
            }),
        }
    }

    /// Serialize `state` and wrap the resulting JSON object.
    ///
    /// `state` must serialize to a map, which is the case for structs with
    /// named fields and for maps with string keys.
    pub fn wrap_serialize<T>(&self, state: &T) -> Result<Tracked<JsonRecord>>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(state).map_err(ReactiveError::Serialize)?;
        self.wrap_json(value)
    }

    /// Register `f` as an effect and run it immediately.
    ///
    /// See [`Effect::new`].
    pub fn effect<F>(&self, f: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new(self, f)
    }

    /// Run `f` without attributing its reads to the current effect.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _ctx = self.inner.stacks.enter(Frame::Untracked);
        f()
    }

    /// The effect that reads on this thread are currently attributed to.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.stacks.current().map(|(id, _)| id)
    }

    /// Number of frames on this thread's active-effect stack, including
    /// `untracked` sections.
    pub fn stack_depth(&self) -> usize {
        self.inner.stacks.depth()
    }

    /// Number of effects subscribed to `key` of `target`.
    pub fn subscriber_count(&self, target: TargetId, key: &str) -> usize {
        self.inner.store.lock().subscriber_count(target, key)
    }

    /// Number of keys of `target` that have at least one subscriber.
    pub fn subscribed_keys(&self, target: TargetId) -> usize {
        self.inner.store.lock().key_count(target)
    }

    /// Number of targets with at least one subscription.
    pub fn target_count(&self) -> usize {
        self.inner.store.lock().target_count()
    }

    /// Whether no subscription exists at all.
    pub fn is_quiescent(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Crate-internal hooks
    // ------------------------------------------------------------------------

    /// Subscribe the active effect to `(target, key)`.
    ///
    /// No-op when no effect is active, inside an untracked section, or when
    /// the active effect has been disposed. Only this runtime's stack is
    /// consulted, so an effect of another runtime never subscribes here.
    pub(crate) fn track(&self, target: TargetId, key: &str) {
        let Some((id, effect)) = self.inner.stacks.current() else {
            trace!(runtime = %self.label(), %target, key, "untracked read");
            return;
        };
        if effect.is_disposed() {
            return;
        }

        let mut store = self.inner.store.lock();
        if let Some(dependency) = store.subscribe(target, key, id, &effect) {
            trace!(runtime = %self.label(), %target, key, effect = %id, "subscribed");
            effect.push_dependency(dependency);
        }
    }

    /// Re-run every subscriber of `(target, key)`.
    pub(crate) fn trigger(&self, target: TargetId, key: &str) {
        let subscribers = self.inner.store.lock().snapshot(target, key);
        if subscribers.is_empty() {
            return;
        }

        let active = self.inner.stacks.active_ids();
        if let Some(max_depth) = self.inner.config.max_depth {
            if active.len() >= max_depth {
                warn!(
                    runtime = %self.label(),
                    %target,
                    key,
                    depth = active.len(),
                    max_depth,
                    "effect nesting limit reached, write not dispatched"
                );
                return;
            }
        }

        trace!(
            runtime = %self.label(),
            %target,
            key,
            subscribers = subscribers.len(),
            "dispatch"
        );

        for effect in &subscribers {
            if active.contains(&effect.id()) {
                debug!(
                    runtime = %self.label(),
                    %target,
                    key,
                    effect = %effect.id(),
                    "skipping effect that is already running"
                );
                continue;
            }
            effect.run();
        }
    }

    /// Remove every subscription of `effect` and clear its reverse index.
    pub(crate) fn forget(&self, effect: &EffectInner) {
        let dependencies = effect.take_dependencies();
        self.forget_dependencies(effect.id(), &dependencies);
    }

    pub(crate) fn forget_dependencies(&self, effect: EffectId, dependencies: &[Dependency]) {
        if dependencies.is_empty() {
            return;
        }
        self.inner.store.lock().forget(effect, dependencies);
    }

    /// Drop the subscriptions of a record whose last handle went away.
    pub(crate) fn release(&self, target: TargetId) {
        let released = self.inner.store.lock().release(target);
        if released > 0 {
            trace!(runtime = %self.label(), %target, keys = released, "released target");
        }
    }

    /// Push `effect` onto this thread's stack until the guard is dropped.
    pub(crate) fn enter(&self, effect: &Arc<EffectInner>) -> ContextGuard<'_, EffectInner> {
        self.inner.stacks.enter(Frame::Tracking {
            id: effect.id(),
            effect: Arc::clone(effect),
        })
    }

    /// The effect on top of this thread's stack, if any.
    pub(crate) fn current_effect(&self) -> Option<Arc<EffectInner>> {
        self.inner.stacks.current().map(|(_, effect)| effect)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("label", &self.label())
            .field("targets", &self.target_count())
            .field("stack_depth", &self.stack_depth())
            .finish()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
