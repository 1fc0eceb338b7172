//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, so that a
//! read can be attributed to it.
//!
//! # Implementation
//!
//! Each runtime owns one stack per thread. Running an effect pushes a frame
//! for it; the returned guard pops the frame when dropped. The current effect
//! is always the top frame, which is what makes nesting work: when an inner
//! effect finishes, popping its frame resumes attribution to the outer effect
//! instead of clearing it.
//!
//! A stack is a plain `Vec` behind a `DashMap` shard keyed by `ThreadId`.
//! Threads never see each other's frames, and no shard lock is held while an
//! effect body runs.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use smallvec::SmallVec;

use super::id::EffectId;

/// An entry in an active-effect stack.
pub(crate) enum Frame<E> {
    /// An effect body is running; reads are attributed to it.
    Tracking { id: EffectId, effect: Arc<E> },
    /// An untracked section; reads are not attributed to anything.
    Untracked,
}

impl<E> Frame<E> {
    fn id(&self) -> Option<EffectId> {
        match self {
            Frame::Tracking { id, .. } => Some(*id),
            Frame::Untracked => None,
        }
    }
}

/// Per-thread active-effect stacks of one runtime.
pub(crate) struct ActiveStacks<E> {
    stacks: DashMap<ThreadId, Vec<Frame<E>>>,
}

impl<E> ActiveStacks<E> {
    pub(crate) fn new() -> Self {
        Self {
            stacks: DashMap::new(),
        }
    }

    /// Push `frame` onto the calling thread's stack.
    ///
    /// The frame is popped when the returned guard is dropped, including
    /// during unwinding.
    pub(crate) fn enter(&self, frame: Frame<E>) -> ContextGuard<'_, E> {
        let expected = frame.id();
        self.stacks
            .entry(thread::current().id())
            .or_default()
            .push(frame);

        ContextGuard {
            stacks: self,
            expected,
        }
    }

    /// The effect on top of the calling thread's stack, if it is tracking.
    pub(crate) fn current(&self) -> Option<(EffectId, Arc<E>)> {
        self.stacks
            .get(&thread::current().id())
            .and_then(|stack| match stack.last() {
                Some(Frame::Tracking { id, effect }) => Some((*id, Arc::clone(effect))),
                _ => None,
            })
    }

    /// IDs of every effect on the calling thread's stack, bottom first.
    pub(crate) fn active_ids(&self) -> SmallVec<[EffectId; 8]> {
        self.stacks
            .get(&thread::current().id())
            .map(|stack| stack.iter().filter_map(Frame::id).collect())
            .unwrap_or_default()
    }

    /// Number of frames on the calling thread's stack.
    pub(crate) fn depth(&self) -> usize {
        self.stacks
            .get(&thread::current().id())
            .map(|stack| stack.len())
            .unwrap_or(0)
    }

    fn pop(&self) -> Option<Frame<E>> {
        let thread = thread::current().id();
        let popped = self.stacks.get_mut(&thread).and_then(|mut stack| stack.pop());
        self.stacks.remove_if(&thread, |_, stack| stack.is_empty());
        popped
    }
}

impl<E> Default for ActiveStacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that pops its frame when dropped.
pub(crate) struct ContextGuard<'a, E> {
    stacks: &'a ActiveStacks<E>,
    expected: Option<EffectId>,
}

impl<E> Drop for ContextGuard<'_, E> {
    fn drop(&mut self) {
        // Bind the frame so its effect handle is released after the shard
        // lock, never under it.
        let popped = self.stacks.pop();

        if let Some(frame) = &popped {
            debug_assert_eq!(
                frame.id(),
                self.expected,
                "active-effect frame mismatch: expected {:?}, got {:?}",
                self.expected,
                frame.id()
            );
        }
    }
}
