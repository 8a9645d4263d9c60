#![forbid(unsafe_code)]

//! Mutable-state containers that track their dependents.
//!
//! An [`Observable`] does not hold a value. Domain code wraps its own state
//! and calls [`mutate`](Observable::mutate) whenever that state changes;
//! reads call [`observe`](Observable::observe) so the reaction being tracked
//! at that moment becomes a dependent.
//!
//! # Invariants
//!
//! 1. Dependents are kept in insertion order, unique by reaction identity.
//! 2. `mutate()` enqueues the observable at most once per flush: only the
//!    call that flips `pending` from `false` to `true` reaches the runner.
//! 3. Once disposed, the dependent set is empty and stays empty.
//! 4. An observable holds its runtime weakly. Once the runtime is dropped,
//!    `mutate()` and `observe()` do nothing.
//!
//! # Failure Modes
//!
//! - **Subscribing to a disposed observable**: reported as
//!   [`Diagnostic::SubscribeToDisposed`]; the call is a no-op.
//! - **Mutating a disposed observable**: silently ignored.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diagnostics::Diagnostic;
use crate::reaction::Reaction;
use crate::reaction_set::ReactionSet;
use crate::runtime::{Runtime, WeakRuntime};

/// Label used when an observable is created without one.
pub const DEFAULT_LABEL: &str = "Some observable";

static NEXT_OBSERVABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Observable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservableId(u64);

impl ObservableId {
    fn next() -> Self {
        Self(NEXT_OBSERVABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

struct ObservableInner {
    id: ObservableId,
    label: String,
    reactions: RefCell<ReactionSet>,
    pending: Cell<bool>,
    disposed: Cell<bool>,
    runtime: WeakRuntime,
}

/// A dependency-tracked mutation signal.
///
/// Cloning an `Observable` creates a new handle to the **same** observable.
#[derive(Clone)]
pub struct Observable {
    inner: Rc<ObservableInner>,
}

impl Observable {
    /// Create an observable bound to `runtime`.
    ///
    /// `label` is diagnostic only; an empty label becomes
    /// [`DEFAULT_LABEL`].
    pub fn new(runtime: &Runtime, label: impl Into<String>) -> Self {
        let mut label = label.into();
        if label.is_empty() {
            label = DEFAULT_LABEL.to_string();
        }
        Self {
            inner: Rc::new(ObservableInner {
                id: ObservableId::next(),
                label,
                reactions: RefCell::new(ReactionSet::new()),
                pending: Cell::new(false),
                disposed: Cell::new(false),
                runtime: runtime.downgrade(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ObservableId {
        self.inner.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of registered dependents, disposed ones included until the
    /// next flush prunes them.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner.reactions.borrow().len()
    }

    /// Borrow the dependent set.
    ///
    /// # Panics
    ///
    /// Panics if called while the runner prunes this observable's
    /// dependents, which never overlaps with user code.
    #[must_use]
    pub fn reactions(&self) -> Ref<'_, ReactionSet> {
        self.inner.reactions.borrow()
    }

    /// Remove every dependent without disposing the observable.
    ///
    /// Removed reactions are not disposed; they may be registered again.
    pub fn clear_dependents(&self) {
        self.inner.reactions.borrow_mut().clear();
    }

    /// Register `reaction` as a dependent.
    ///
    /// Adding the same reaction twice is a no-op. On a disposed observable
    /// this reports [`Diagnostic::SubscribeToDisposed`] and does nothing.
    pub fn add_dependent(&self, reaction: &Reaction) {
        if self.is_disposed() {
            self.report_disposed();
            return;
        }
        self.inner.reactions.borrow_mut().add(reaction);
    }

    /// Wrap `callback` in a new reaction and register it.
    ///
    /// The returned handle removes (and disposes) exactly that reaction.
    /// Dropping the handle does **not** unsubscribe.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Unsubscribe {
        if self.is_disposed() {
            self.report_disposed();
            return Unsubscribe::inert();
        }
        let reaction = Reaction::new(callback);
        self.inner.reactions.borrow_mut().add(&reaction);
        Unsubscribe {
            target: Some((Rc::downgrade(&self.inner), reaction)),
        }
    }

    /// Register the runtime's active reaction as a dependent.
    ///
    /// Returns `false` and reports a diagnostic when no reaction is tracked.
    pub fn observe(&self) -> bool {
        match self.inner.runtime.upgrade() {
            Some(runtime) => runtime.context().observe_if_tracking(self),
            None => false,
        }
    }

    /// Signal that the wrapped state changed.
    ///
    /// The first call after a flush marks the observable pending and hands it
    /// to the runner; further calls before the flush are no-ops. Never runs a
    /// reaction synchronously.
    pub fn mutate(&self) {
        if self.is_disposed() {
            return;
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };
        if self.inner.pending.get() {
            runtime.note_repeated_mutation(self);
            return;
        }
        self.inner.pending.set(true);
        if runtime.context().is_debug() {
            tracing::debug!(observable = self.label(), "mutated");
        }
        runtime.enqueue(self.clone());
    }

    /// Clear the pending flag once this observable's dependents have run.
    pub fn settle(&self) {
        self.inner.pending.set(false);
    }

    /// Dispose the observable, releasing every dependent. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let debug = self
            .inner
            .runtime
            .upgrade()
            .is_some_and(|rt| rt.context().is_debug());
        if debug {
            tracing::debug!(
                observable = self.label(),
                subscribers = self.dependent_count(),
                "dispose: subscribers before"
            );
        }
        self.inner.reactions.borrow_mut().clear();
        if debug {
            tracing::debug!(
                observable = self.label(),
                subscribers = self.dependent_count(),
                "dispose: subscribers after"
            );
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Prune disposed dependents and snapshot the survivors in order.
    pub(crate) fn dependents_for_walk(&self) -> Vec<Reaction> {
        let mut reactions = self.inner.reactions.borrow_mut();
        reactions.prune_disposed();
        reactions.snapshot()
    }

    pub(crate) fn mark_pending(&self) {
        self.inner.pending.set(true);
    }

    fn report_disposed(&self) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.context().report(Diagnostic::SubscribeToDisposed {
                observable: self.label().to_string(),
            });
        }
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Observable {}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("dependents", &self.inner.reactions.borrow().len())
            .field("pending", &self.inner.pending.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

// ─── Unsubscribe ─────────────────────────────────────────────────────────────

/// Handle returned by [`Observable::subscribe`].
///
/// Holds the observable weakly, so it never keeps it alive.
pub struct Unsubscribe {
    target: Option<(Weak<ObservableInner>, Reaction)>,
}

impl Unsubscribe {
    fn inert() -> Self {
        Self { target: None }
    }

    /// Remove and dispose the subscribed reaction. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        let Some((observable, reaction)) = &self.target else {
            return;
        };
        reaction.dispose();
        if let Some(inner) = observable.upgrade() {
            inner.reactions.borrow_mut().remove_id(reaction.id());
        }
    }

    /// Whether the subscription still delivers notifications.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match &self.target {
            Some((observable, reaction)) => {
                !reaction.is_disposed() && observable.strong_count() > 0
            }
            None => false,
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn runtime() -> Runtime {
        Runtime::lab(RuntimeConfig::default())
            .expect("valid config")
            .0
    }

    #[test]
    fn empty_label_gets_default() {
        let rt = runtime();
        assert_eq!(Observable::new(&rt, "").label(), DEFAULT_LABEL);
        assert_eq!(Observable::new(&rt, "TodoList").label(), "TodoList");
    }

    #[test]
    fn add_dependent_deduplicates() {
        let rt = runtime();
        let ob = rt.observable("ob");
        let r = Reaction::new(|| {});
        ob.add_dependent(&r);
        ob.add_dependent(&r);
        assert_eq!(ob.dependent_count(), 1);
    }

    #[test]
    fn mutate_sets_pending_once() {
        let rt = runtime();
        let ob = rt.observable("ob");
        assert!(!ob.is_pending());

        ob.mutate();
        ob.mutate();
        assert!(ob.is_pending());
        assert_eq!(rt.stats().queue_len, 1);

        ob.settle();
        assert!(!ob.is_pending());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let rt = runtime();
        let ob = rt.observable("ob");
        let keep = Reaction::new(|| {});
        ob.add_dependent(&keep);
        let unsub = ob.subscribe(|| {});
        assert!(unsub.is_active());
        assert_eq!(ob.dependent_count(), 2);

        unsub.unsubscribe();
        unsub.unsubscribe();
        assert!(!unsub.is_active());
        assert_eq!(ob.dependent_count(), 1);
        assert!(ob.reactions().contains(&keep));
    }

    #[test]
    fn unsubscribe_after_observable_dropped() {
        let rt = runtime();
        let unsub = {
            let ob = rt.observable("short-lived");
            ob.subscribe(|| {})
        };
        assert!(!unsub.is_active());
        unsub.unsubscribe();
    }

    #[test]
    fn disposed_observable_is_inert() {
        let rt = runtime();
        let ob = rt.observable("ob");
        ob.add_dependent(&Reaction::new(|| {}));
        ob.subscribe(|| {});
        assert_eq!(ob.dependent_count(), 2);

        ob.dispose();
        assert!(ob.is_disposed());
        assert_eq!(ob.dependent_count(), 0);

        ob.add_dependent(&Reaction::new(|| {}));
        let unsub = ob.subscribe(|| {});
        assert_eq!(ob.dependent_count(), 0);
        assert!(!unsub.is_active());
        unsub.unsubscribe();

        let diagnostics = rt.context().take_diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert!(
            diagnostics
                .iter()
                .all(|d| matches!(d, Diagnostic::SubscribeToDisposed { .. }))
        );
    }

    #[test]
    fn dispose_twice_matches_once() {
        let rt = runtime();
        let ob = rt.observable("ob");
        ob.subscribe(|| {});
        ob.dispose();
        ob.dispose();
        assert!(ob.is_disposed());
        assert_eq!(ob.dependent_count(), 0);
        assert!(rt.context().diagnostics().is_empty());
    }

    #[test]
    fn mutate_after_dispose_is_ignored() {
        let rt = runtime();
        let ob = rt.observable("ob");
        ob.dispose();
        ob.mutate();
        assert!(!ob.is_pending());
        assert_eq!(rt.stats().queue_len, 0);
    }

    #[test]
    fn observe_without_tracking_reports() {
        let rt = runtime();
        let ob = rt.observable("Theme");
        assert!(!ob.observe());
        assert_eq!(ob.dependent_count(), 0);

        let diagnostics = rt.context().take_diagnostics();
        assert_eq!(
            diagnostics,
            vec![Diagnostic::TrackingWithoutReaction {
                observable: "Theme".into()
            }]
        );
    }

    #[test]
    fn observe_registers_active_reaction() {
        let rt = runtime();
        let ob = rt.observable("ob");
        let r = Reaction::new(|| {});
        rt.track(&r, || {
            assert!(ob.observe());
            assert!(ob.observe());
        });
        assert_eq!(ob.dependent_count(), 1);
        assert!(ob.reactions().contains(&r));
    }

    #[test]
    fn clear_dependents_keeps_observable_usable() {
        let rt = runtime();
        let ob = rt.observable("ob");
        let r = Reaction::new(|| {});
        ob.add_dependent(&r);
        ob.subscribe(|| {});

        ob.clear_dependents();
        assert_eq!(ob.dependent_count(), 0);
        assert!(!r.is_disposed());
        ob.add_dependent(&r);
        assert_eq!(ob.dependent_count(), 1);

        ob.dispose();
        ob.clear_dependents();
        ob.add_dependent(&r);
        assert_eq!(ob.dependent_count(), 0);
    }

    #[test]
    fn observable_outliving_its_runtime_is_inert() {
        let rt = runtime();
        let ob = rt.observable("orphan");
        let weak = rt.downgrade();
        drop(rt);
        assert!(weak.upgrade().is_none());

        ob.mutate();
        assert!(!ob.is_pending());
        assert!(!ob.observe());

        ob.dispose();
        ob.add_dependent(&Reaction::new(|| {}));
        assert_eq!(ob.dependent_count(), 0);
    }

    #[test]
    fn walk_snapshot_prunes_disposed() {
        let rt = runtime();
        let ob = rt.observable("ob");
        let a = Reaction::new(|| {});
        let b = Reaction::new(|| {});
        ob.add_dependent(&a);
        ob.add_dependent(&b);
        a.dispose();

        let walk = ob.dependents_for_walk();
        assert_eq!(walk, vec![b]);
        assert_eq!(ob.dependent_count(), 1);
    }
}
