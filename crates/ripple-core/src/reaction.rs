#![forbid(unsafe_code)]

//! Re-runnable units of computation.
//!
//! A [`Reaction`] wraps a zero-argument callback. The scheduler decides when
//! and how often it runs; the reaction itself only carries the bookkeeping
//! the scheduler needs:
//!
//! - a process-unique [`ReactionId`] used for set membership,
//! - the last cycle it ran in, used to run it at most once per flush,
//! - a disposed flag.
//!
//! # Invariants
//!
//! 1. Identity is stable for the reaction's lifetime. Clones share it.
//! 2. A disposed reaction never runs again, not even through [`Reaction::run`].
//! 3. Disposal does not remove the reaction from any set. Owners prune it
//!    lazily the next time they walk their dependents.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// ─── Identity ────────────────────────────────────────────────────────────────

static NEXT_REACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identity of a [`Reaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactionId(u64);

impl ReactionId {
    fn next() -> Self {
        Self(NEXT_REACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logging).
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

// ─── Reaction ────────────────────────────────────────────────────────────────

struct ReactionInner {
    id: ReactionId,
    callback: Box<dyn Fn()>,
    /// `None` until the scheduler (or a tracked render) stamps it.
    last_cycle: Cell<Option<u64>>,
    disposed: Cell<bool>,
}

/// A disposable, re-runnable callback.
///
/// Cloning a `Reaction` creates a new handle to the **same** reaction.
#[derive(Clone)]
pub struct Reaction {
    inner: Rc<ReactionInner>,
}

impl Reaction {
    /// Wrap `callback` in a new reaction that has never run.
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self {
            inner: Rc::new(ReactionInner {
                id: ReactionId::next(),
                callback: Box::new(callback),
                last_cycle: Cell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ReactionId {
        self.inner.id
    }

    /// Invoke the callback synchronously.
    ///
    /// There is no re-entrancy guard: the scheduler is responsible for
    /// calling this at most once per cycle. Does nothing once disposed.
    pub fn run(&self) {
        if self.inner.disposed.get() {
            return;
        }
        (self.inner.callback)();
    }

    /// Mark the reaction disposed. Idempotent.
    pub fn dispose(&self) {
        self.inner.disposed.set(true);
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// The cycle this reaction last ran in, or `None` if it never ran.
    #[inline]
    #[must_use]
    pub fn last_cycle(&self) -> Option<u64> {
        self.inner.last_cycle.get()
    }

    /// Record that the reaction has run (or rendered) in `cycle`.
    pub fn mark_cycle(&self, cycle: u64) {
        self.inner.last_cycle.set(Some(cycle));
    }

    /// Whether the reaction has already been stamped with `cycle`.
    #[inline]
    #[must_use]
    pub fn ran_in(&self, cycle: u64) -> bool {
        self.inner.last_cycle.get() == Some(cycle)
    }

    /// Identity comparison.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Reaction) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Reaction {}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("id", &self.inner.id)
            .field("last_cycle", &self.inner.last_cycle.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
