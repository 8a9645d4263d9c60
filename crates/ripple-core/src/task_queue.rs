#![forbid(unsafe_code)]

//! Deferred-callback primitive used to schedule flushes.
//!
//! The runtime never runs reactions from inside `mutate()`. It asks a
//! [`TaskQueue`] to call it back after a short delay, which lets every
//! synchronous mutation in the same turn collapse into one flush.
//!
//! [`DeferredQueue`] is the bundled implementation. It keeps tasks ordered by
//! due time and runs them when the host pumps it:
//!
//! - **Real time** ([`DeferredQueue::real`]): the host event loop calls
//!   [`run_due`](DeferredQueue::run_due), sleeping until
//!   [`next_deadline`](DeferredQueue::next_deadline) in between.
//! - **Lab time** ([`DeferredQueue::lab`]): time only moves through
//!   [`advance`](DeferredQueue::advance), which makes flush timing fully
//!   deterministic in tests.
//!
//! # Invariants
//!
//! 1. Tasks run in due-time order; ties run in scheduling order.
//! 2. No internal borrow is held while a task runs, so tasks may schedule
//!    further tasks.
//! 3. `advance(d)` runs exactly the tasks due within the window, including
//!    tasks scheduled by earlier tasks in the same window.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;

use web_time::{Duration, Instant};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

/// Host-provided "run this after the current turn" primitive.
pub trait TaskQueue {
    /// Run `task` once `delay` has elapsed (or later).
    fn schedule(&self, delay: Duration, task: Task);
}

// ─── Time source ─────────────────────────────────────────────────────────────

/// A manually-advanceable clock for deterministic tests.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset: Rc<Cell<Duration>>,
}

impl LabClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Advance the lab clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.offset.set(self.offset.get() + delta);
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + self.offset.get()
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    fn advance_to(&self, instant: Instant) {
        if let Some(delta) = instant.checked_duration_since(self.now()) {
            self.advance(delta);
        }
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
enum TimeSource {
    Real,
    Lab(LabClock),
}

impl TimeSource {
    fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(clock) => clock.now(),
        }
    }
}

// ─── DeferredQueue ───────────────────────────────────────────────────────────

struct Entry {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap pops the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Timer queue pumped by its owner.
pub struct DeferredQueue {
    time: TimeSource,
    entries: RefCell<BinaryHeap<Entry>>,
    next_seq: Cell<u64>,
    executed: Cell<u64>,
}

impl DeferredQueue {
    /// Queue driven by wall-clock time.
    #[must_use]
    pub fn real() -> Self {
        Self::with_time(TimeSource::Real)
    }

    /// Queue driven by a fresh [`LabClock`].
    #[must_use]
    pub fn lab() -> Self {
        Self::with_lab_clock(LabClock::new())
    }

    /// Queue driven by an existing [`LabClock`].
    #[must_use]
    pub fn with_lab_clock(clock: LabClock) -> Self {
        Self::with_time(TimeSource::Lab(clock))
    }

    fn with_time(time: TimeSource) -> Self {
        Self {
            time,
            entries: RefCell::new(BinaryHeap::new()),
            next_seq: Cell::new(0),
            executed: Cell::new(0),
        }
    }

    /// The lab clock, if this queue runs on lab time.
    #[must_use]
    pub fn lab_clock(&self) -> Option<&LabClock> {
        match &self.time {
            TimeSource::Lab(clock) => Some(clock),
            TimeSource::Real => None,
        }
    }

    #[must_use]
    pub fn now(&self) -> Instant {
        self.time.now()
    }

    /// Number of tasks waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Tasks executed over the queue's lifetime.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.executed.get()
    }

    /// Due time of the earliest waiting task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.borrow().peek().map(|e| e.due)
    }

    /// Run every task that is due now. Returns how many ran.
    pub fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.time.now();
            let Some(entry) = self.pop_due(now) else {
                break;
            };
            self.execute(entry);
            ran += 1;
        }
        ran
    }

    /// Move lab time forward by `delta`, running each task as its due time
    /// is reached. On a real-time queue this only runs what is already due.
    pub fn advance(&self, delta: Duration) -> usize {
        let TimeSource::Lab(clock) = &self.time else {
            return self.run_due();
        };
        let target = clock.now() + delta;
        let mut ran = 0;
        while let Some(entry) = self.pop_due(target) {
            clock.advance_to(entry.due);
            self.execute(entry);
            ran += 1;
        }
        clock.advance_to(target);
        ran
    }

    /// Run waiting tasks in order regardless of due time, jumping the lab
    /// clock forward as needed, until the queue is empty or `max_tasks` ran.
    pub fn run_until_idle(&self, max_tasks: usize) -> usize {
        let mut ran = 0;
        while ran < max_tasks {
            let Some(entry) = self.entries.borrow_mut().pop() else {
                break;
            };
            if let TimeSource::Lab(clock) = &self.time {
                clock.advance_to(entry.due);
            }
            self.execute(entry);
            ran += 1;
        }
        ran
    }

    /// Discard every waiting task without running it.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    fn pop_due(&self, limit: Instant) -> Option<Entry> {
        let mut entries = self.entries.borrow_mut();
        if entries.peek().is_some_and(|e| e.due <= limit) {
            entries.pop()
        } else {
            None
        }
    }

    fn execute(&self, entry: Entry) {
        self.executed.set(self.executed.get() + 1);
        (entry.task)();
    }
}

impl TaskQueue for DeferredQueue {
    fn schedule(&self, delay: Duration, task: Task) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.entries.borrow_mut().push(Entry {
            due: self.time.now() + delay,
            seq,
            task,
        });
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("lab", &self.lab_clock().is_some())
            .field("waiting", &self.len())
            .field("executed", &self.executed.get())
            .finish()
    }
}
