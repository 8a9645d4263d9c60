#![forbid(unsafe_code)]

//! Errors and the non-fatal diagnostic channel.
//!
//! Misuse of the reactive graph never fails an operation. Subscribing to a
//! disposed observable, tracking with no active reaction, a runaway
//! mutation loop or a panicking reaction each produce a [`Diagnostic`],
//! which is logged at `WARN` and retained in a bounded [`DiagnosticLog`]
//! for hosts and tests to inspect.
//!
//! [`ConfigError`] is the only error surfaced through `Result`.

use std::collections::VecDeque;

use thiserror::Error;

use crate::reaction::ReactionId;

/// Invalid [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("loop_limit must be at least 1")]
    ZeroLoopLimit,

    #[error("loop_warn_after ({warn_after}) must be below loop_limit ({limit})")]
    WarnAfterLimit { warn_after: u32, limit: u32 },

    #[error("diagnostics_capacity must be at least 1")]
    ZeroDiagnosticsCapacity,

    #[error("unknown panic policy: {value}")]
    UnknownPanicPolicy { value: String },
}

/// A recoverable problem reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error("attempt to subscribe to disposed observable `{observable}`")]
    SubscribeToDisposed { observable: String },

    #[error("observe(`{observable}`) ignored: no reaction is being tracked")]
    TrackingWithoutReaction { observable: String },

    #[error(
        "mutations generated while reactions run may cause an infinite loop \
         (loop passes: {passes}, frequently mutated: [{}])",
        .observables.join(", ")
    )]
    MutationLoop {
        passes: u32,
        observables: Vec<String>,
    },

    #[error(
        "infinite loop: reactions kept re-queueing themselves for {passes} consecutive \
         flushes; the runner is disabled"
    )]
    InfiniteLoop { passes: u32 },

    #[error("reaction {reaction} panicked while `{observable}` was flushed: {message}")]
    ReactionPanicked {
        reaction: ReactionId,
        observable: String,
        message: String,
    },
}

impl Diagnostic {
    /// Short stable name for the diagnostic kind (used as a log field).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SubscribeToDisposed { .. } => "subscribe_to_disposed",
            Self::TrackingWithoutReaction { .. } => "tracking_without_reaction",
            Self::MutationLoop { .. } => "mutation_loop",
            Self::InfiniteLoop { .. } => "infinite_loop",
            Self::ReactionPanicked { .. } => "reaction_panicked",
        }
    }
}

/// Bounded record of recent diagnostics plus a lifetime total.
#[derive(Debug)]
pub struct DiagnosticLog {
    recent: VecDeque<Diagnostic>,
    capacity: usize,
    total: u64,
}

impl DiagnosticLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Record a diagnostic, evicting the oldest once full.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(diagnostic);
        self.total += 1;
    }

    /// Retained diagnostics, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &Diagnostic> {
        self.recent.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Diagnostics ever recorded, including evicted ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Take every retained diagnostic, leaving the total untouched.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.recent.drain(..).collect()
    }
}
