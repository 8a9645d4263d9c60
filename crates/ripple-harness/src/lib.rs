#![forbid(unsafe_code)]

//! Test harness and reference fixtures for Ripple.
//!
//! - [`fixtures`]: observable domain models (`TodoList`, `Task`,
//!   `ThemeManager`).
//! - [`views`]: a miniature component tree bound through `TrackedView`,
//!   with per-component render counters.
//! - [`act`]: a recording act hook for test mode.
//! - [`trace_capture`]: test logging setup and `WARN` capture.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use ripple_core::{Duration, Runtime, RuntimeConfig};
//! use ripple_harness::fixtures::{ThemeManager, TodoList};
//! use ripple_harness::views::{RenderCounts, TodoApp};
//!
//! let (rt, timers) = Runtime::lab(RuntimeConfig::default()).unwrap();
//! let todo = TodoList::new(&rt, "Todo");
//! let theme = ThemeManager::new(&rt);
//! let counts = RenderCounts::new();
//! let _app = TodoApp::mount(&rt, todo.clone(), Some(theme.clone()), counts.clone());
//!
//! todo.set_title("Groceries");
//! theme.set_theme("dark");
//! timers.advance(Duration::from_millis(200));
//!
//! assert_eq!(counts.app(), 2);
//! assert_eq!(counts.theme_label(), 2);
//! ```

pub mod act;
pub mod fixtures;
pub mod trace_capture;
pub mod views;

use std::rc::Rc;

use ripple_core::{DeferredQueue, Duration, Runtime, RuntimeConfig};

pub use act::ActRecorder;
pub use trace_capture::{CapturedWarning, capture_warnings, init_test_logging};

/// How long a scenario waits for pending flushes to settle.
pub const SETTLE: Duration = Duration::from_millis(200);

/// A lab runtime in test mode with a recording act hook installed.
pub struct Scenario {
    pub runtime: Runtime,
    pub timers: Rc<DeferredQueue>,
    pub act: ActRecorder,
}

impl Scenario {
    /// Build a scenario from `RuntimeConfig::from_env()` with test mode on.
    ///
    /// # Panics
    ///
    /// Panics if the environment overrides produce an invalid config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::from_env().with_test_mode(true))
    }

    /// # Panics
    ///
    /// Panics if `config` is invalid.
    #[must_use]
    pub fn with_config(config: RuntimeConfig) -> Self {
        init_test_logging();
        let (runtime, timers) = match Runtime::lab(config) {
            Ok(pair) => pair,
            Err(err) => panic!("invalid scenario config: {err}"),
        };
        let act = ActRecorder::new();
        act.install(&runtime);
        Self {
            runtime,
            timers,
            act,
        }
    }

    /// Advance lab time until pending flushes have run.
    pub fn settle(&self) -> usize {
        self.timers.advance(SETTLE)
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}
