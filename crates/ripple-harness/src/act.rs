#![forbid(unsafe_code)]

//! Stand-in for a UI framework's test synchronization primitive.
//!
//! In test mode every forced update goes through the context's act hook.
//! [`ActRecorder`] installs one that counts how often it was entered and how
//! deeply calls nested, then runs the update inline.

use std::cell::Cell;
use std::rc::Rc;

use ripple_core::{ActHook, Runtime};

#[derive(Debug, Clone, Default)]
pub struct ActRecorder {
    entered: Rc<Cell<u32>>,
    depth: Rc<Cell<u32>>,
    max_depth: Rc<Cell<u32>>,
}

impl ActRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install this recorder as `runtime`'s act hook.
    pub fn install(&self, runtime: &Runtime) {
        runtime.context().set_act_hook(Some(self.hook()));
    }

    #[must_use]
    pub fn hook(&self) -> ActHook {
        let recorder = self.clone();
        Rc::new(move |update: &dyn Fn()| {
            recorder.entered.set(recorder.entered.get() + 1);
            let depth = recorder.depth.get() + 1;
            recorder.depth.set(depth);
            recorder.max_depth.set(recorder.max_depth.get().max(depth));
            tracing::trace!(depth, "act");
            let _leave = LeaveAct {
                depth: &recorder.depth,
                restore: depth - 1,
            };
            update();
        })
    }

    /// Number of updates routed through the hook.
    #[must_use]
    pub fn entered(&self) -> u32 {
        self.entered.get()
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth.get()
    }
}

/// Restores the nesting depth when an update returns or unwinds.
struct LeaveAct<'a> {
    depth: &'a Cell<u32>,
    restore: u32,
}

impl Drop for LeaveAct<'_> {
    fn drop(&mut self) {
        self.depth.set(self.restore);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use ripple_core::RuntimeConfig;

    #[test]
    fn counts_entries_only_in_test_mode() {
        let (rt, _timers) = Runtime::lab(RuntimeConfig::default()).expect("valid config");
        let recorder = ActRecorder::new();
        recorder.install(&rt);

        let ran = Cell::new(0u32);
        rt.context().act(&|| ran.set(ran.get() + 1));
        assert_eq!(recorder.entered(), 0);

        rt.context().set_test_mode(true);
        rt.context().act(&|| ran.set(ran.get() + 1));
        assert_eq!(ran.get(), 2);
        assert_eq!(recorder.entered(), 1);
        assert_eq!(recorder.max_depth(), 1);
    }

    #[test]
    fn depth_recovers_after_a_panicking_update() {
        let recorder = ActRecorder::new();
        let hook = recorder.hook();

        let result = catch_unwind(AssertUnwindSafe(|| {
            hook(&|| panic!("forced update failed"));
        }));
        assert!(result.is_err());

        hook(&|| {});
        assert_eq!(recorder.entered(), 2);
        assert_eq!(recorder.max_depth(), 1);

        let inner = recorder.hook();
        hook(&|| inner(&|| {}));
        assert_eq!(recorder.max_depth(), 2);
    }
}
