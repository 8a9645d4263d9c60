#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! [`RuntimeConfig`] is a plain value: build it with [`Default`] plus the
//! `with_*` setters, or overlay environment overrides with
//! [`RuntimeConfig::from_env`]. [`Runtime::new`](crate::Runtime::new)
//! validates it before use.
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `RIPPLE_DEBUG` | `debug` (`1`/`true`/`yes`/`on`) |
//! | `RIPPLE_TEST_MODE` | `test_mode` |
//! | `RIPPLE_FLUSH_DELAY_MS` | `flush_delay` |
//! | `RIPPLE_LOOP_LIMIT` | `loop_limit` |
//! | `RIPPLE_LOOP_WARN_AFTER` | `loop_warn_after` |
//! | `RIPPLE_PANIC_POLICY` | `panic_policy` (`isolate`/`propagate`) |
//!
//! Unparsable values are ignored and the default is kept.

use std::env;
use std::str::FromStr;

use web_time::Duration;

use crate::diagnostics::ConfigError;

/// Delay between the first mutation of a batch and its flush.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(10);

/// Consecutive residual passes tolerated before a loop diagnostic.
pub const DEFAULT_LOOP_WARN_AFTER: u32 = 2;

/// Consecutive residual passes after which the runner shuts down.
pub const DEFAULT_LOOP_LIMIT: u32 = 20;

/// What the runner does when a reaction callback panics mid-flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Catch the panic, report it, and continue with the next reaction.
    #[default]
    Isolate,
    /// Restore the runner to a consistent idle state and resume unwinding.
    Propagate,
}

impl FromStr for PanicPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "isolate" => Ok(Self::Isolate),
            "propagate" => Ok(Self::Propagate),
            other => Err(ConfigError::UnknownPanicPolicy {
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Delay before a scheduled flush runs.
    /// Default: 10ms.
    pub flush_delay: Duration,

    /// A loop diagnostic is reported once the number of consecutive flushes
    /// that left residual work exceeds this value.
    /// Default: 2.
    pub loop_warn_after: u32,

    /// Consecutive residual flushes after which the runner aborts for good.
    /// Default: 20.
    pub loop_limit: u32,

    /// Emit debug-level trace events for flushes, mutations and disposal.
    /// Default: false.
    pub debug: bool,

    /// Route forced updates through the context's act hook.
    /// Default: false.
    pub test_mode: bool,

    /// Reaction panic handling.
    /// Default: [`PanicPolicy::Isolate`].
    pub panic_policy: PanicPolicy,

    /// Number of recent diagnostics retained for inspection.
    /// Default: 64.
    pub diagnostics_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_delay: DEFAULT_FLUSH_DELAY,
            loop_warn_after: DEFAULT_LOOP_WARN_AFTER,
            loop_limit: DEFAULT_LOOP_LIMIT,
            debug: false,
            test_mode: false,
            panic_policy: PanicPolicy::Isolate,
            diagnostics_capacity: 64,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with `RIPPLE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("RIPPLE_DEBUG")
            && let Some(flag) = parse_flag(&val)
        {
            self.debug = flag;
        }
        if let Some(val) = lookup("RIPPLE_TEST_MODE")
            && let Some(flag) = parse_flag(&val)
        {
            self.test_mode = flag;
        }
        if let Some(val) = lookup("RIPPLE_FLUSH_DELAY_MS")
            && let Ok(ms) = val.trim().parse::<u64>()
        {
            self.flush_delay = Duration::from_millis(ms);
        }
        if let Some(val) = lookup("RIPPLE_LOOP_LIMIT")
            && let Ok(limit) = val.trim().parse::<u32>()
        {
            self.loop_limit = limit;
        }
        if let Some(val) = lookup("RIPPLE_LOOP_WARN_AFTER")
            && let Ok(warn) = val.trim().parse::<u32>()
        {
            self.loop_warn_after = warn;
        }
        if let Some(val) = lookup("RIPPLE_PANIC_POLICY")
            && let Ok(policy) = val.parse()
        {
            self.panic_policy = policy;
        }
        self
    }

    #[must_use]
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    #[must_use]
    pub fn with_loop_limits(mut self, warn_after: u32, limit: u32) -> Self {
        self.loop_warn_after = warn_after;
        self.loop_limit = limit;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    #[must_use]
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }

    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Check the loop thresholds and diagnostic capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_limit == 0 {
            return Err(ConfigError::ZeroLoopLimit);
        }
        if self.loop_warn_after >= self.loop_limit {
            return Err(ConfigError::WarnAfterLimit {
                warn_after: self.loop_warn_after,
                limit: self.loop_limit,
            });
        }
        if self.diagnostics_capacity == 0 {
            return Err(ConfigError::ZeroDiagnosticsCapacity);
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
