//! Reactive Primitives
//!
//! This module implements dependency tracking: tracked records, effects, and
//! the runtime connecting them.
//!
//! # Concepts
//!
//! ## Tracked Records
//!
//! A [`Tracked`] record is a plain key/value [`Record`] whose accesses go
//! through the runtime. Reading a property inside an effect subscribes the
//! effect to that property. Writing a property re-runs its subscribers.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever a
//! property it read during its latest run is written. Dependencies are
//! collected again on every run, so they always reflect the branch the
//! computation actually took.
//!
//! ## Runtime
//!
//! The [`Runtime`] owns the subscription store and one active-effect stack per
//! thread. It is passed explicitly, so independent runtimes never interfere.
//!
//! # Implementation Notes
//!
//! The stack is what attributes a read to the right effect when effects nest.
//! It also drives the re-entrancy guard: a write never re-runs an effect that
//! is still executing further up the stack, which keeps an effect that reads
//! and writes the same property from recursing forever.

mod context;
mod effect;
mod id;
mod record;
mod runtime;
mod store;
mod tracked;

pub use effect::Effect;
pub use id::{EffectId, TargetId};
pub use record::{JsonRecord, Record};
pub use runtime::Runtime;
pub use store::Dependency;
pub use tracked::Tracked;
