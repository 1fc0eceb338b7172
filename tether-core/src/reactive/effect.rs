//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a tracked
//! property it read during its latest run is written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. Every run starts by removing all subscriptions from the previous run,
//!    then pushes the effect onto the active-effect stack and calls the
//!    function. Reads made during the call subscribe the effect again.
//!
//! 3. When any of those properties is written, the runtime re-runs the
//!    effect synchronously, before the write returns.
//!
//! Rebuilding the dependency set on every run is what makes conditional
//! reads behave: a property read only on a branch that was not taken this
//! time no longer triggers the effect.
//!
//! # Ownership
//!
//! The runtime only holds effects weakly. An effect lives as long as some
//! [`Effect`] handle does, or as long as the effect that created it keeps it
//! as a child. Children are disposed whenever their parent re-runs, so each
//! parent run owns a fresh set of inner effects.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace_span;

use super::id::EffectId;
use super::runtime::Runtime;
use super::store::Dependency;

/// A side-effecting computation that runs when its dependencies change.
///
/// Cloning an `Effect` creates a new handle to the **same** effect. The effect
/// is discarded when its last handle is dropped, or when [`dispose`] is called.
///
/// [`dispose`]: Effect::dispose
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let state = runtime.wrap_json(json!({ "count": 0 }))?;
///
/// let effect = Effect::new(&runtime, {
///     let state = state.clone();
///     move || println!("Count is: {:?}", state.get("count"))
/// });
///
/// state.set("count", json!(5));  // Prints: "Count is: Some(Number(5))"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

pub(crate) struct EffectInner {
    id: EffectId,

    runtime: Runtime,

    /// The effect function.
    callback: Box<dyn Fn() + Send + Sync>,

    /// Reverse index: every `(target, key)` this effect is subscribed to.
    dependencies: Mutex<SmallVec<[Dependency; 4]>>,

    /// Effects registered while this effect's latest run was executing.
    children: Mutex<Vec<Effect>>,

    disposed: AtomicBool,

    run_count: AtomicUsize,
}

impl Effect {
    /// Create a new effect and run it immediately to establish its
    /// dependencies.
    ///
    /// When called from inside another effect's body, the new effect becomes
    /// a child of that effect.
    pub fn new<F>(runtime: &Runtime, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::new_lazy(runtime, f);
        effect.inner.run();
        effect
    }

    /// Create a new effect without running it.
    ///
    /// The effect has no dependencies until [`run`](Effect::run) is called.
    pub fn new_lazy<F>(runtime: &Runtime, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                runtime: runtime.clone(),
                callback: Box::new(f),
                dependencies: Mutex::new(SmallVec::new()),
                children: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        };

        if let Some(parent) = runtime.current_effect() {
            parent.adopt(effect.clone());
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Re-run the effect now, re-collecting its dependencies.
    ///
    /// Does nothing once the effect has been disposed.
    pub fn run(&self) {
        self.inner.run();
    }

    /// Dispose of the effect.
    ///
    /// Removes all of its subscriptions and disposes its children. After
    /// disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of completed runs. A run during which the effect was disposed
    /// is not counted.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of `(target, key)` pairs the effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// The `(target, key)` pairs the effect is subscribed to, in the order they
    /// were first read during the latest run.
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner.dependencies.lock().to_vec()
    }

    /// Number of effects created during the latest run that this effect owns.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }

    /// The runtime this effect belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl EffectInner {
    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run the effect: drop stale children and subscriptions, then call the
    /// function with this effect on top of the stack.
    pub(crate) fn run(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }

        let span = trace_span!("effect", runtime = %self.runtime.label(), effect = %self.id);
        let _span = span.enter();

        self.dispose_children();
        self.runtime.forget(self);

        let _ctx = self.runtime.enter(self);
        (self.callback)();

        // A body that disposed its own effect does not count as a run.
        if !self.is_disposed() {
            self.run_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.dispose_children();
        self.runtime.forget(self);
    }

    pub(crate) fn push_dependency(&self, dependency: Dependency) {
        self.dependencies.lock().push(dependency);
    }

    pub(crate) fn take_dependencies(&self) -> SmallVec<[Dependency; 4]> {
        std::mem::take(&mut *self.dependencies.lock())
    }

    fn adopt(&self, child: Effect) {
        self.children.lock().push(child);
    }

    fn dispose_children(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in &children {
            child.dispose();
        }
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        let dependencies = std::mem::take(self.dependencies.get_mut());
        self.runtime.forget_dependencies(self.id, &dependencies);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(&runtime, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1 })).unwrap();
        let state_clone = state.clone();

        let effect = Effect::new_lazy(&runtime, move || {
            state_clone.get("a");
        });

        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.dependency_count(), 0);

        // Manually run
        effect.run();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1 })).unwrap();
        let state_clone = state.clone();

        let effect = Effect::new(&runtime, move || {
            state_clone.get("a");
        });
        assert_eq!(runtime.subscriber_count(state.id(), "a"), 1);

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(runtime.subscriber_count(state.id(), "a"), 0);

        state.set("a", json!(2));
        effect.run();
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn run_that_disposes_itself_is_not_counted() {
        let runtime = Runtime::new();
        let slot: Arc<Mutex<Option<Effect>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();

        let effect = Effect::new_lazy(&runtime, move || {
            let this = slot_clone.lock().take();
            if let Some(this) = this {
                this.dispose();
            }
        });
        *slot.lock() = Some(effect.clone());

        effect.run();
        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 0);
    }

    #[test]
    fn effect_tracks_run_count() {
        let runtime = Runtime::new();
        let effect = Effect::new(&runtime, || {});

        assert_eq!(effect.run_count(), 1);

        effect.run();
        assert_eq!(effect.run_count(), 2);

        effect.run();
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = Effect::new(&runtime, || {});
        let effect2 = effect1.clone();

        // Same ID
        assert_eq!(effect1.id(), effect2.id());

        // Shared run count
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        // Shared disposal state
        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn dependencies_follow_read_order() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1, "b": 2 })).unwrap();
        let state_clone = state.clone();

        let effect = Effect::new(&runtime, move || {
            state_clone.get("b");
            state_clone.get("a");
            state_clone.get("b");
        });

        let keys: Vec<_> = effect
            .dependencies()
            .into_iter()
            .map(|dependency| dependency.key.to_string())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn dropping_the_last_handle_unsubscribes() {
        let runtime = Runtime::new();
        let state = runtime.wrap_json(json!({ "a": 1 })).unwrap();
        let state_clone = state.clone();

        let effect = Effect::new(&runtime, move || {
            state_clone.get("a");
        });
        assert_eq!(runtime.subscriber_count(state.id(), "a"), 1);

        drop(effect);
        assert_eq!(runtime.subscriber_count(state.id(), "a"), 0);
    }

    #[test]
    fn parent_owns_children_created_during_its_run() {
        let runtime = Runtime::new();
        let inner_runtime = runtime.clone();

        let parent = Effect::new(&runtime, move || {
            // The handle is dropped here; the parent keeps the child alive.
            Effect::new(&inner_runtime, || {});
        });
        assert_eq!(parent.child_count(), 1);

        parent.run();
        assert_eq!(parent.child_count(), 1);

        parent.dispose();
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn rerun_disposes_previous_children() {
        let runtime = Runtime::new();
        let inner_runtime = runtime.clone();
        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = captured.clone();

        let parent = Effect::new(&runtime, move || {
            let child = Effect::new(&inner_runtime, || {});
            captured_clone.lock().push(child);
        });
        parent.run();

        let children = captured.lock();
        assert_eq!(children.len(), 2);
        assert!(children[0].is_disposed());
        assert!(!children[1].is_disposed());
    }
}
