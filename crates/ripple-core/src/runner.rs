#![forbid(unsafe_code)]

//! Batching reaction scheduler.
//!
//! Mutated observables are queued, and a single flush is scheduled on the
//! runtime's [`TaskQueue`](crate::TaskQueue) after the configured delay. A
//! flush walks the queue in order and runs each dependent reaction at most
//! once per cycle.
//!
//! # State machine
//!
//! ```text
//!   Idle ──enqueue──▶ Pending ──timer / flush_now──▶ Flushing ──▶ Idle
//!                                                        │
//!                                     residual work ≥ limit
//!                                                        ▼
//!                                                   LoopAborted
//! ```
//!
//! # Invariants
//!
//! 1. At most one flush timer is live per batch. A timer whose batch was
//!    already flushed (e.g. by [`Runtime::flush_now`]) does nothing.
//! 2. A reaction runs at most once per cycle, even when it depends on several
//!    queued observables.
//! 3. Mutations made while a flush runs are never run in that flush; they are
//!    deferred to the next one.
//! 4. No runner borrow is held while a reaction runs.
//!
//! # Failure Modes
//!
//! - **Runaway loop**: every flush that leaves deferred work bumps a counter.
//!   Past `loop_warn_after` a [`Diagnostic::MutationLoop`] is reported per
//!   pass; at `loop_limit` the runner reports [`Diagnostic::InfiniteLoop`]
//!   and enters [`RunnerStatus::LoopAborted`], where enqueues are ignored.
//! - **Panicking reaction**: see [`PanicPolicy`].

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

use ahash::AHashSet;

use crate::config::PanicPolicy;
use crate::diagnostics::Diagnostic;
use crate::observable::{Observable, ObservableId};
use crate::reaction::Reaction;
use crate::runtime::Runtime;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerStatus {
    /// Nothing queued.
    Idle,
    /// A flush is scheduled.
    Pending,
    /// A flush is running.
    Flushing,
    /// A runaway mutation loop was detected. Terminal.
    LoopAborted,
}

/// Counters exposed through [`Runtime::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Completed flushes.
    pub flush_passes: u64,
    /// Reaction invocations across all flushes.
    pub reactions_run: u64,
    /// Reaction invocations in the most recent flush.
    pub last_flush_reactions: u64,
    /// Consecutive flushes that left deferred work behind.
    pub loop_passes: u32,
    /// Observables waiting for the next flush.
    pub queue_len: usize,
    /// Observables mutated during the running flush.
    pub deferred_len: usize,
}

struct RunnerState {
    status: RunnerStatus,
    queue: Vec<Observable>,
    queued: AHashSet<ObservableId>,
    deferred: Vec<Observable>,
    walking: Option<ObservableId>,
    walk_remutated: bool,
    generation: u64,
    loop_passes: u32,
    flush_passes: u64,
    reactions_run: u64,
    last_flush_reactions: u64,
}

impl RunnerState {
    fn push_queue(&mut self, observable: Observable) {
        if self.queued.insert(observable.id()) {
            self.queue.push(observable);
        }
    }
}

pub(crate) struct ReactionRunner {
    state: RefCell<RunnerState>,
}

impl ReactionRunner {
    pub(crate) fn new() -> Self {
        Self {
            state: RefCell::new(RunnerState {
                status: RunnerStatus::Idle,
                queue: Vec::new(),
                queued: AHashSet::new(),
                deferred: Vec::new(),
                walking: None,
                walk_remutated: false,
                generation: 0,
                loop_passes: 0,
                flush_passes: 0,
                reactions_run: 0,
                last_flush_reactions: 0,
            }),
        }
    }

    pub(crate) fn status(&self) -> RunnerStatus {
        self.state.borrow().status
    }

    pub(crate) fn stats(&self) -> RunnerStats {
        let st = self.state.borrow();
        RunnerStats {
            flush_passes: st.flush_passes,
            reactions_run: st.reactions_run,
            last_flush_reactions: st.last_flush_reactions,
            loop_passes: st.loop_passes,
            queue_len: st.queue.len(),
            deferred_len: st.deferred.len(),
        }
    }

    // ── Enqueue ──────────────────────────────────────────────────────

    pub(crate) fn enqueue(&self, rt: &Runtime, observable: Observable) {
        let generation = {
            let mut st = self.state.borrow_mut();
            match st.status {
                RunnerStatus::LoopAborted => {
                    tracing::trace!(observable = observable.label(), "runner aborted; ignored");
                    return;
                }
                RunnerStatus::Flushing => {
                    st.deferred.push(observable);
                    return;
                }
                RunnerStatus::Pending => {
                    st.push_queue(observable);
                    return;
                }
                RunnerStatus::Idle => {
                    st.push_queue(observable);
                    st.status = RunnerStatus::Pending;
                    st.generation += 1;
                    st.generation
                }
            }
        };
        self.schedule_flush(rt, generation);
    }

    /// An already-pending observable was mutated again. If it is the one
    /// being walked right now, the new mutation must survive `settle()`.
    pub(crate) fn note_repeated_mutation(&self, observable: &Observable) {
        let mut st = self.state.borrow_mut();
        if st.status == RunnerStatus::Flushing && st.walking == Some(observable.id()) {
            st.walk_remutated = true;
        }
    }

    fn schedule_flush(&self, rt: &Runtime, generation: u64) {
        let weak = rt.downgrade();
        rt.tasks().schedule(
            rt.config().flush_delay,
            Box::new(move || {
                if let Some(rt) = weak.upgrade() {
                    rt.run_scheduled_flush(generation);
                }
            }),
        );
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let st = self.state.borrow();
        st.status == RunnerStatus::Pending && st.generation == generation
    }

    // ── Flush ────────────────────────────────────────────────────────

    /// Run one flush. The caller checks the runner is `Pending`.
    pub(crate) fn flush(&self, rt: &Runtime) {
        let queue = {
            let mut st = self.state.borrow_mut();
            st.status = RunnerStatus::Flushing;
            st.queued.clear();
            mem::take(&mut st.queue)
        };
        let ctx = rt.context();
        let cycle = ctx.advance_cycle();
        if ctx.is_debug() {
            tracing::debug!(cycle, queued = queue.len(), "start executing reactions");
        }

        let cursor = Cell::new(0usize);
        let executed = match rt.config().panic_policy {
            PanicPolicy::Isolate => self.walk(rt, &queue, cycle, &cursor),
            PanicPolicy::Propagate => {
                match catch_unwind(AssertUnwindSafe(|| self.walk(rt, &queue, cycle, &cursor))) {
                    Ok(executed) => executed,
                    Err(payload) => {
                        self.recover(rt, &queue[cursor.get()..]);
                        resume_unwind(payload);
                    }
                }
            }
        };

        if ctx.is_debug() {
            tracing::debug!(cycle, executed, "end of reactions executing");
        }
        self.finish(rt, executed);
    }

    fn walk(&self, rt: &Runtime, queue: &[Observable], cycle: u64, cursor: &Cell<usize>) -> u64 {
        let debug = rt.context().is_debug();
        let mut executed = 0;
        for (index, observable) in queue.iter().enumerate() {
            cursor.set(index);
            if observable.is_disposed() || !observable.is_pending() {
                continue;
            }
            let dependents = observable.dependents_for_walk();
            if debug {
                tracing::debug!(
                    observable = observable.label(),
                    subscribers = dependents.len(),
                    "running reactions"
                );
            }
            {
                let mut st = self.state.borrow_mut();
                st.walking = Some(observable.id());
                st.walk_remutated = false;
            }
            for reaction in &dependents {
                if reaction.is_disposed() || reaction.ran_in(cycle) {
                    continue;
                }
                reaction.mark_cycle(cycle);
                run_reaction(rt, reaction, observable);
                executed += 1;
            }
            observable.settle();

            let mut st = self.state.borrow_mut();
            st.walking = None;
            if mem::take(&mut st.walk_remutated) {
                observable.mark_pending();
                st.deferred.push(observable.clone());
            }
        }
        cursor.set(queue.len());
        executed
    }

    fn finish(&self, rt: &Runtime, executed: u64) {
        let config = rt.config();
        let (deferred, passes) = {
            let mut st = self.state.borrow_mut();
            st.status = RunnerStatus::Idle;
            st.flush_passes += 1;
            st.reactions_run += executed;
            st.last_flush_reactions = executed;
            let deferred = mem::take(&mut st.deferred);
            if deferred.is_empty() {
                st.loop_passes = 0;
                return;
            }
            st.loop_passes += 1;
            (deferred, st.loop_passes)
        };

        if passes > config.loop_warn_after {
            let mut labels: Vec<String> = Vec::with_capacity(deferred.len());
            for observable in &deferred {
                if !labels.iter().any(|l| l == observable.label()) {
                    labels.push(observable.label().to_string());
                }
            }
            rt.context().report(Diagnostic::MutationLoop {
                passes,
                observables: labels,
            });
        }

        if passes < config.loop_limit {
            for observable in deferred {
                self.enqueue(rt, observable);
            }
        } else {
            {
                let mut st = self.state.borrow_mut();
                st.status = RunnerStatus::LoopAborted;
                st.queue.clear();
                st.queued.clear();
            }
            rt.context().report(Diagnostic::InfiniteLoop { passes });
        }
    }

    /// Put the runner back to a consistent state after a reaction panic
    /// escaped the walk. Unwalked observables (including the one being walked)
    /// and deferred ones are queued for the next flush.
    fn recover(&self, rt: &Runtime, unwalked: &[Observable]) {
        let deferred = {
            let mut st = self.state.borrow_mut();
            st.status = RunnerStatus::Idle;
            st.walking = None;
            st.walk_remutated = false;
            mem::take(&mut st.deferred)
        };
        let survivors = unwalked
            .iter()
            .chain(deferred.iter())
            .filter(|ob| !ob.is_disposed() && ob.is_pending());
        for observable in survivors {
            self.enqueue(rt, observable.clone());
        }
    }
}

fn run_reaction(rt: &Runtime, reaction: &Reaction, observable: &Observable) {
    match rt.config().panic_policy {
        PanicPolicy::Propagate => reaction.run(),
        PanicPolicy::Isolate => {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| reaction.run())) {
                rt.context().report(Diagnostic::ReactionPanicked {
                    reaction: reaction.id(),
                    observable: observable.label().to_string(),
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
