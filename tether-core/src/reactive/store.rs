//! Subscription Store
//!
//! A two-level association from tracked target to property key to the ordered
//! set of effects that read that property during their latest run.
//!
//! # Ownership
//!
//! The store never owns what it indexes:
//!
//! - Targets are keyed by [`TargetId`]. Records are not referenced at all, and
//!   their entry is released when the last handle to the record goes away.
//! - Effects are held as `Weak` references. An effect that is dropped removes
//!   itself from every set named in its reverse index.
//!
//! Empty key sets and empty targets are pruned as soon as they become empty, so
//! a `(target, key)` entry exists only while some effect depends on it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use super::id::{EffectId, TargetId};

/// A `(target, key)` pair an effect read during its latest run.
///
/// Effects keep a list of these as their reverse index, which is what lets a
/// re-run remove exactly the subscriptions it created last time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// The tracked record that was read.
    pub target: TargetId,
    /// The property key that was read.
    pub key: Arc<str>,
}

/// Subscribers of a single property, in subscription order.
type Subscribers<E> = IndexMap<EffectId, Weak<E>>;

/// The store proper. `E` is the effect state the runtime dispatches to.
pub(crate) struct SubscriptionStore<E> {
    targets: HashMap<TargetId, IndexMap<Arc<str>, Subscribers<E>>>,
}

impl<E> SubscriptionStore<E> {
    pub(crate) fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Add `effect` to the subscribers of `(target, key)`.
    ///
    /// Returns the dependency to append to the effect's reverse index, or
    /// `None` if the effect was already subscribed.
    pub(crate) fn subscribe(
        &mut self,
        target: TargetId,
        key: &str,
        effect: EffectId,
        handle: &Arc<E>,
    ) -> Option<Dependency> {
        let keys = self.targets.entry(target).or_default();

        // Reuse the interned key so every dependency shares one allocation.
        let key: Arc<str> = match keys.get_key_value(key) {
            Some((existing, _)) => Arc::clone(existing),
            None => Arc::from(key),
        };

        let subscribers = keys.entry(Arc::clone(&key)).or_default();
        if subscribers.contains_key(&effect) {
            return None;
        }
        subscribers.insert(effect, Arc::downgrade(handle));

        Some(Dependency { target, key })
    }

    /// Remove `effect` from every set named in `dependencies`.
    ///
    /// Dependencies whose target or key is already gone are ignored.
    pub(crate) fn forget<'a, I>(&mut self, effect: EffectId, dependencies: I)
    where
        I: IntoIterator<Item = &'a Dependency>,
    {
        for dependency in dependencies {
            let Some(keys) = self.targets.get_mut(&dependency.target) else {
                continue;
            };

            if let Some(subscribers) = keys.get_mut(&*dependency.key) {
                subscribers.shift_remove(&effect);
                if subscribers.is_empty() {
                    keys.shift_remove(&*dependency.key);
                }
            }

            if keys.is_empty() {
                self.targets.remove(&dependency.target);
            }
        }
    }

    /// Drop every subscription recorded against `target`.
    ///
    /// Returns the number of keys that were still subscribed.
    pub(crate) fn release(&mut self, target: TargetId) -> usize {
        self.targets
            .remove(&target)
            .map(|keys| keys.len())
            .unwrap_or(0)
    }

    /// Owned snapshot of the live subscribers of `(target, key)`.
    ///
    /// The snapshot is detached from the store, so the caller may re-run
    /// effects (which mutates these very sets) while iterating it.
    pub(crate) fn snapshot(&self, target: TargetId, key: &str) -> Vec<Arc<E>> {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map(|subscribers| subscribers.values().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Number of effects subscribed to `(target, key)`.
    pub(crate) fn subscriber_count(&self, target: TargetId, key: &str) -> usize {
        self.targets
            .get(&target)
            .and_then(|keys| keys.get(key))
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Number of subscribed keys recorded against `target`.
    pub(crate) fn key_count(&self, target: TargetId) -> usize {
        self.targets.get(&target).map(|keys| keys.len()).unwrap_or(0)
    }

    /// Number of targets with at least one subscription.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<E> Default for SubscriptionStore<E> {
    fn default() -> Self {
        Self::new()
    }
}
