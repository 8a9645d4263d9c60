#![forbid(unsafe_code)]

//! Dependency-tracking observables with a batching reaction scheduler.
//!
//! - [`Observable`]: a mutation signal that records which reactions read it.
//! - [`Reaction`]: an identity-bearing callback re-run when a dependency
//!   changes.
//! - [`ReactionSet`]: insertion-ordered, identity-unique reaction storage.
//! - [`Runtime`]: owns the [`ReactiveContext`] and the scheduler; mutations
//!   are coalesced into one deferred flush per turn.
//! - [`TrackedView`]: binds a view component's render to a reaction.
//!
//! # Architecture
//!
//! Everything is single-threaded and uses `Rc`/`RefCell`. Observables hold
//! their dependents strongly and their runtime weakly; disposing a reaction only marks it, and flushes
//! prune disposed entries lazily. The scheduler never runs reactions from
//! inside `mutate()`: it asks the runtime's [`TaskQueue`] for a callback
//! after [`RuntimeConfig::flush_delay`].
//!
//! # Invariants
//!
//! 1. Dependents are notified in registration order.
//! 2. A reaction runs at most once per flush cycle.
//! 3. Mutations made during a flush are deferred to the next flush.
//! 4. A runaway loop of self-re-queueing reactions is cut off after
//!    [`RuntimeConfig::loop_limit`] consecutive passes.

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod observable;
pub mod reaction;
pub mod reaction_set;
pub mod runner;
pub mod runtime;
pub mod task_queue;
pub mod tracked;

pub use config::{PanicPolicy, RuntimeConfig};
pub use context::{ActHook, ReactiveContext};
pub use diagnostics::{ConfigError, Diagnostic, DiagnosticLog};
pub use observable::{DEFAULT_LABEL, Observable, ObservableId, Unsubscribe};
pub use reaction::{Reaction, ReactionId};
pub use reaction_set::ReactionSet;
pub use runner::{RunnerStats, RunnerStatus};
pub use runtime::{Runtime, WeakRuntime};
pub use task_queue::{DeferredQueue, LabClock, Task, TaskQueue};
pub use tracked::TrackedView;

pub use web_time::{Duration, Instant};
