#![forbid(unsafe_code)]

//! Ripple public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use ripple_core as core;
#[cfg(feature = "harness")]
pub use ripple_harness as harness;

pub mod prelude {
    pub use ripple_core::{
        Diagnostic, Duration, Observable, PanicPolicy, Reaction, ReactionSet, Runtime,
        RuntimeConfig, RunnerStatus, TaskQueue, TrackedView, Unsubscribe,
    };
}
