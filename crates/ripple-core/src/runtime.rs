#![forbid(unsafe_code)]

//! The runtime handle that owns one reactive graph.
//!
//! A [`Runtime`] bundles the configuration, the [`ReactiveContext`], the
//! reaction runner and the [`TaskQueue`] used to defer flushes. Observables
//! hold a weak handle to the runtime they were created in, so dropping the
//! last `Runtime` frees the graph even with a batch queued. Independent runtimes
//! share nothing, so tests can build one per case.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use ripple_core::{Duration, Runtime, RuntimeConfig};
//!
//! let (rt, timers) = Runtime::lab(RuntimeConfig::default()).unwrap();
//! let todo = rt.observable("TodoList");
//!
//! let log = Rc::new(RefCell::new(String::new()));
//! for tag in ['1', '2', '3'] {
//!     let log = Rc::clone(&log);
//!     todo.subscribe(move || log.borrow_mut().push(tag));
//! }
//!
//! todo.mutate();
//! todo.mutate();
//! assert_eq!(*log.borrow(), "");
//!
//! timers.advance(Duration::from_millis(200));
//! assert_eq!(*log.borrow(), "123");
//! ```

use std::fmt;
use std::rc::{Rc, Weak};

use crate::config::RuntimeConfig;
use crate::context::ReactiveContext;
use crate::diagnostics::ConfigError;
use crate::observable::Observable;
use crate::reaction::Reaction;
use crate::runner::{ReactionRunner, RunnerStats, RunnerStatus};
use crate::task_queue::{DeferredQueue, TaskQueue};

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    context: ReactiveContext,
    runner: ReactionRunner,
    tasks: Rc<dyn TaskQueue>,
}

/// Handle to a reactive graph and its scheduler.
///
/// Cloning a `Runtime` creates a new handle to the **same** runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime that defers flushes through `tasks`.
    pub fn new(config: RuntimeConfig, tasks: Rc<dyn TaskQueue>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Rc::new(RuntimeInner {
                context: ReactiveContext::new(&config),
                runner: ReactionRunner::new(),
                config,
                tasks,
            }),
        })
    }

    /// Create a runtime on a lab-clock [`DeferredQueue`], returning both.
    pub fn lab(config: RuntimeConfig) -> Result<(Self, Rc<DeferredQueue>), ConfigError> {
        let queue = Rc::new(DeferredQueue::lab());
        let runtime = Self::new(config, queue.clone())?;
        Ok((runtime, queue))
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn context(&self) -> &ReactiveContext {
        &self.inner.context
    }

    /// Create an observable bound to this runtime.
    pub fn observable(&self, label: impl Into<String>) -> Observable {
        Observable::new(self, label)
    }

    /// Create a reaction. Reactions are not bound to a runtime; this is a
    /// convenience for symmetry with [`observable`](Self::observable).
    pub fn reaction(&self, callback: impl Fn() + 'static) -> Reaction {
        Reaction::new(callback)
    }

    /// See [`ReactiveContext::observe_if_tracking`].
    pub fn observe_if_tracking(&self, observable: &Observable) -> bool {
        self.inner.context.observe_if_tracking(observable)
    }

    /// See [`ReactiveContext::track`].
    pub fn track<R>(&self, reaction: &Reaction, f: impl FnOnce() -> R) -> R {
        self.inner.context.track(reaction, f)
    }

    #[must_use]
    pub fn status(&self) -> RunnerStatus {
        self.inner.runner.status()
    }

    #[must_use]
    pub fn stats(&self) -> RunnerStats {
        self.inner.runner.stats()
    }

    /// Run the pending flush now instead of waiting for the timer.
    ///
    /// Returns `false` if nothing was pending (or a flush is in progress).
    /// The timer scheduled for this batch becomes a no-op.
    pub fn flush_now(&self) -> bool {
        if self.inner.runner.status() != RunnerStatus::Pending {
            return false;
        }
        self.inner.runner.flush(self);
        true
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn tasks(&self) -> &dyn TaskQueue {
        self.inner.tasks.as_ref()
    }

    pub(crate) fn enqueue(&self, observable: Observable) {
        self.inner.runner.enqueue(self, observable);
    }

    pub(crate) fn note_repeated_mutation(&self, observable: &Observable) {
        self.inner.runner.note_repeated_mutation(observable);
    }

    pub(crate) fn run_scheduled_flush(&self, generation: u64) {
        if self.inner.runner.is_current(generation) {
            self.inner.runner.flush(self);
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("status", &self.status())
            .field("stats", &self.stats())
            .field("context", &self.inner.context)
            .finish()
    }
}

/// Non-owning handle to a [`Runtime`], held by scheduled flush tasks.
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    #[must_use]
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

impl fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRuntime")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ConfigError;

    #[test]
    fn invalid_config_is_rejected() {
        let err = Runtime::lab(RuntimeConfig::default().with_loop_limits(0, 0))
            .err()
            .expect("zero loop limit must be rejected");
        assert_eq!(err, ConfigError::ZeroLoopLimit);
    }

    #[test]
    fn runtimes_are_isolated() {
        let (a, _ta) = Runtime::lab(RuntimeConfig::default()).expect("valid config");
        let (b, _tb) = Runtime::lab(RuntimeConfig::default()).expect("valid config");
        assert!(!a.ptr_eq(&b));

        a.observable("x").mutate();
        assert_eq!(a.status(), RunnerStatus::Pending);
        assert_eq!(b.status(), RunnerStatus::Idle);

        let r = a.reaction(|| {});
        a.track(&r, || {
            assert!(a.context().is_tracking());
            assert!(!b.context().is_tracking());
        });
    }

    #[test]
    fn weak_handle_upgrades_while_alive() {
        let (rt, _timers) = Runtime::lab(RuntimeConfig::default()).expect("valid config");
        let weak = rt.downgrade();
        assert!(weak.upgrade().is_some_and(|r| r.ptr_eq(&rt)));
        drop(rt);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn config_toggles_seed_the_context() {
        let config = RuntimeConfig::default().with_debug(true).with_test_mode(true);
        let (rt, _timers) = Runtime::lab(config).expect("valid config");
        assert!(rt.context().is_debug());
        assert!(rt.context().is_test_mode());
    }
}
