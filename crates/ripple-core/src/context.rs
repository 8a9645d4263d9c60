#![forbid(unsafe_code)]

//! Per-runtime reactive context.
//!
//! The context holds the state that every participant of one reactive graph
//! shares:
//!
//! - the **active reaction** slot: the reaction that observables read right
//!   now should register as a dependent, or `None` when nothing is tracked;
//! - the **cycle** counter, bumped once per flush;
//! - the debug and test-mode toggles and the test-mode act hook;
//! - the diagnostic log.
//!
//! Each [`Runtime`](crate::Runtime) owns its own context, so independent
//! graphs never observe each other's state.
//!
//! # Tracking protocol
//!
//! A binding swaps its reaction in, runs the tracked computation, then puts
//! the previous reaction back. [`ReactiveContext::track`] does all three and
//! restores the slot even if the computation unwinds, so nested tracked
//! computations compose.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::diagnostics::{Diagnostic, DiagnosticLog};
use crate::observable::Observable;
use crate::reaction::Reaction;

/// Host synchronization primitive wrapped around forced updates in test mode.
pub type ActHook = Rc<dyn Fn(&dyn Fn())>;

/// Shared state of one reactive graph.
pub struct ReactiveContext {
    active: RefCell<Option<Reaction>>,
    cycle: Cell<u64>,
    debug: Cell<bool>,
    test_mode: Cell<bool>,
    act_hook: RefCell<Option<ActHook>>,
    diagnostics: RefCell<DiagnosticLog>,
}

impl ReactiveContext {
    pub(crate) fn new(config: &RuntimeConfig) -> Self {
        Self {
            active: RefCell::new(None),
            cycle: Cell::new(0),
            debug: Cell::new(config.debug),
            test_mode: Cell::new(config.test_mode),
            act_hook: RefCell::new(None),
            diagnostics: RefCell::new(DiagnosticLog::new(config.diagnostics_capacity)),
        }
    }

    // ── Active reaction ──────────────────────────────────────────────

    /// The reaction currently being tracked.
    #[must_use]
    pub fn active_reaction(&self) -> Option<Reaction> {
        self.active.borrow().clone()
    }

    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.active.borrow().is_some()
    }

    /// Replace the active reaction, returning the previous one.
    pub fn set_active_reaction(&self, reaction: Option<Reaction>) -> Option<Reaction> {
        self.active.replace(reaction)
    }

    /// Run `f` with `reaction` active, then restore the previous reaction.
    pub fn track<R>(&self, reaction: &Reaction, f: impl FnOnce() -> R) -> R {
        let previous = self.set_active_reaction(Some(reaction.clone()));
        let _restore = RestoreActive {
            ctx: self,
            previous: Some(previous),
        };
        f()
    }

    /// Register the active reaction as a dependent of `observable`.
    ///
    /// Returns `false` (and reports a diagnostic) when nothing is tracked.
    pub fn observe_if_tracking(&self, observable: &Observable) -> bool {
        match self.active_reaction() {
            Some(reaction) => {
                if self.is_debug() {
                    tracing::debug!(
                        observable = observable.label(),
                        reaction = %reaction.id(),
                        "observe"
                    );
                }
                observable.add_dependent(&reaction);
                true
            }
            None => {
                self.report(Diagnostic::TrackingWithoutReaction {
                    observable: observable.label().to_string(),
                });
                false
            }
        }
    }

    // ── Cycle ────────────────────────────────────────────────────────

    /// The current flush cycle. Starts at 0 and increases by one per flush.
    #[inline]
    #[must_use]
    pub fn current_cycle(&self) -> u64 {
        self.cycle.get()
    }

    pub(crate) fn advance_cycle(&self) -> u64 {
        let next = self.cycle.get() + 1;
        self.cycle.set(next);
        next
    }

    // ── Toggles ──────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug.get()
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.set(enabled);
    }

    #[inline]
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        self.test_mode.get()
    }

    pub fn set_test_mode(&self, enabled: bool) {
        self.test_mode.set(enabled);
    }

    /// Install (or remove) the test-mode synchronization hook.
    pub fn set_act_hook(&self, hook: Option<ActHook>) {
        *self.act_hook.borrow_mut() = hook;
    }

    /// Run `f` through the act hook when test mode is on and a hook is
    /// installed, directly otherwise.
    pub fn act(&self, f: &dyn Fn()) {
        let hook = if self.is_test_mode() {
            self.act_hook.borrow().clone()
        } else {
            None
        };
        match hook {
            Some(hook) => hook(f),
            None => f(),
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Log `diagnostic` at `WARN` and retain it.
    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(kind = diagnostic.kind(), "{diagnostic}");
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// Borrow the diagnostic log.
    ///
    /// # Panics
    ///
    /// Panics if a diagnostic is reported while the borrow is held.
    #[must_use]
    pub fn diagnostics(&self) -> Ref<'_, DiagnosticLog> {
        self.diagnostics.borrow()
    }

    /// Take every retained diagnostic.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow_mut().drain()
    }
}

impl fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("active", &self.active.borrow().as_ref().map(Reaction::id))
            .field("cycle", &self.cycle.get())
            .field("debug", &self.debug.get())
            .field("test_mode", &self.test_mode.get())
            .field("diagnostics", &self.diagnostics.borrow().total())
            .finish()
    }
}

struct RestoreActive<'a> {
    ctx: &'a ReactiveContext,
    previous: Option<Option<Reaction>>,
}

impl Drop for RestoreActive<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.ctx.set_active_reaction(previous);
        }
    }
}
