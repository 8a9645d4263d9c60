#![forbid(unsafe_code)]

//! Binding helper for view components.
//!
//! A [`TrackedView`] owns one long-lived [`Reaction`] for a component. Every
//! render runs under that reaction, so each observable the render reads
//! becomes a dependency; when one of them is mutated, the next flush calls
//! the component's `force_update`.
//!
//! Rendering stamps the reaction with the current cycle. A parent re-render
//! triggered by a flush therefore suppresses a second run of the child's own
//! reaction in the same cycle.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use ripple_core::{Duration, Runtime, RuntimeConfig, TrackedView};
//!
//! let (rt, timers) = Runtime::lab(RuntimeConfig::default()).unwrap();
//! let theme = rt.observable("Theme");
//!
//! let updates = Rc::new(Cell::new(0));
//! let u = Rc::clone(&updates);
//! let view = TrackedView::new(&rt, move || u.set(u.get() + 1));
//!
//! view.render(|| theme.observe());
//! theme.mutate();
//! timers.advance(Duration::from_millis(20));
//! assert_eq!(updates.get(), 1);
//! ```

use std::fmt;

use crate::reaction::Reaction;
use crate::runtime::Runtime;

/// One component's reactive binding. Disposed on drop.
pub struct TrackedView {
    runtime: Runtime,
    reaction: Reaction,
}

impl TrackedView {
    /// Create a binding whose reaction calls `force_update`.
    ///
    /// In test mode the call goes through the context's act hook.
    pub fn new(runtime: &Runtime, force_update: impl Fn() + 'static) -> Self {
        let weak = runtime.downgrade();
        let reaction = Reaction::new(move || match weak.upgrade() {
            Some(rt) => rt.context().act(&force_update),
            None => force_update(),
        });
        Self {
            runtime: runtime.clone(),
            reaction,
        }
    }

    /// Run a render pass with this view's reaction active.
    ///
    /// Nested renders restore the outer view's reaction when they return.
    /// Rendering an unmounted view still runs `f`; anything it reads is
    /// registered against a disposed reaction and pruned on the next flush.
    pub fn render<R>(&self, f: impl FnOnce() -> R) -> R {
        let ctx = self.runtime.context();
        self.reaction.mark_cycle(ctx.current_cycle());
        ctx.track(&self.reaction, f)
    }

    /// Dispose the reaction. Idempotent.
    pub fn unmount(&self) {
        if !self.reaction.is_disposed() && self.runtime.context().is_debug() {
            tracing::debug!(reaction = %self.reaction.id(), "unmount");
        }
        self.reaction.dispose();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.reaction.is_disposed()
    }

    #[must_use]
    pub fn reaction(&self) -> &Reaction {
        &self.reaction
    }
}

impl Drop for TrackedView {
    fn drop(&mut self) {
        self.reaction.dispose();
    }
}

impl fmt::Debug for TrackedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedView")
            .field("reaction", &self.reaction.id())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
