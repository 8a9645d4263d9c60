#![forbid(unsafe_code)]

//! Tracing helpers for tests.
//!
//! - [`init_test_logging`] installs a global `fmt` subscriber that honours
//!   `RUST_LOG` and writes through the test harness.
//! - [`capture_warnings`] runs a closure under a scoped subscriber and
//!   returns every `WARN` event the runtime emitted, with its `kind` field.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "ripple_core=warn,ripple_harness=info";

/// Install a test-friendly global subscriber. Safe to call from every test.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A `WARN` event recorded by [`capture_warnings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWarning {
    pub kind: Option<String>,
    pub message: String,
}

struct WarnCapture {
    events: Arc<Mutex<Vec<CapturedWarning>>>,
}

#[derive(Default)]
struct WarnVisitor {
    kind: Option<String>,
    message: Option<String>,
}

impl Visit for WarnVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "kind" => self.kind = Some(value.to_string()),
            "message" => self.message = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "kind" => self.kind = Some(format!("{value:?}").trim_matches('"').to_string()),
            "message" => self.message = Some(format!("{value:?}")),
            _ => {}
        }
    }
}

impl<S> Layer<S> for WarnCapture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = WarnVisitor::default();
        event.record(&mut visitor);
        if let Ok(mut events) = self.events.lock() {
            events.push(CapturedWarning {
                kind: visitor.kind,
                message: visitor.message.unwrap_or_default(),
            });
        }
    }
}

/// Run `f` with a scoped subscriber and return the `WARN` events it emitted.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedWarning>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarnCapture {
        events: Arc::clone(&events),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().map(|e| e.clone()).unwrap_or_default();
    (result, captured)
}
