#![forbid(unsafe_code)]

//! A miniature component tree driven by [`TrackedView`].
//!
//! The tree mirrors how a retained UI framework re-renders: a forced update
//! re-renders the component immediately, and a parent render re-renders every
//! child. Children keep their identity (and reaction) across parent renders;
//! task views are keyed by [`TaskUid`] and unmounted when their task is gone.
//!
//! ```text
//! TodoApp ── observes TodoList, ThemeManager
//!  ├── ThemeLabel ── observes ThemeManager
//!  └── TaskView × n ── observes Task
//! ```

use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::{Rc, Weak};

use ripple_core::{Reaction, Runtime, TrackedView};
use serde_json::json;

use crate::fixtures::{Task, TaskUid, ThemeManager, TodoList};

// ─── Render counters ─────────────────────────────────────────────────────────

/// Per-component render totals shared by a tree.
#[derive(Debug, Default)]
pub struct RenderCounts {
    app: Cell<u32>,
    theme_label: Cell<u32>,
    task: Cell<u32>,
}

impl RenderCounts {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn app(&self) -> u32 {
        self.app.get()
    }

    #[must_use]
    pub fn theme_label(&self) -> u32 {
        self.theme_label.get()
    }

    #[must_use]
    pub fn task(&self) -> u32 {
        self.task.get()
    }

    /// One JSONL evidence line for the current totals.
    #[must_use]
    pub fn to_jsonl(&self, scenario: &str) -> String {
        json!({
            "scenario": scenario,
            "app": self.app(),
            "theme_label": self.theme_label(),
            "task": self.task(),
        })
        .to_string()
    }

    fn bump(counter: &Cell<u32>) -> u32 {
        let next = counter.get() + 1;
        counter.set(next);
        next
    }
}

// ─── TodoApp ─────────────────────────────────────────────────────────────────

struct AppInner {
    runtime: Runtime,
    view: TrackedView,
    todo_list: Rc<TodoList>,
    theme: Option<Rc<ThemeManager>>,
    label: ThemeLabel,
    tasks: RefCell<Vec<TaskView>>,
    counts: Rc<RenderCounts>,
}

/// Root component: a todo list plus a theme label.
pub struct TodoApp {
    inner: Rc<AppInner>,
}

impl TodoApp {
    /// Create the tree and perform the initial render.
    pub fn mount(
        runtime: &Runtime,
        todo_list: Rc<TodoList>,
        theme: Option<Rc<ThemeManager>>,
        counts: Rc<RenderCounts>,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<AppInner>| {
            let weak = weak.clone();
            AppInner {
                runtime: runtime.clone(),
                view: TrackedView::new(runtime, move || {
                    if let Some(app) = weak.upgrade() {
                        app.render();
                    }
                }),
                label: ThemeLabel::new(runtime, theme.clone(), Rc::clone(&counts)),
                todo_list,
                theme,
                tasks: RefCell::new(Vec::new()),
                counts,
            }
        });
        inner.render();
        Self { inner }
    }

    #[must_use]
    pub fn reaction(&self) -> &Reaction {
        self.inner.view.reaction()
    }

    #[must_use]
    pub fn label(&self) -> &ThemeLabel {
        &self.inner.label
    }

    #[must_use]
    pub fn mounted_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    /// Rendered text, label first, then one line per task.
    #[must_use]
    pub fn output(&self) -> Vec<String> {
        let mut lines = vec![self.inner.label.output()];
        lines.extend(self.inner.tasks.borrow().iter().map(TaskView::output));
        lines
    }

    /// Unmount the whole tree.
    pub fn unmount(&self) {
        self.inner.view.unmount();
        self.inner.label.unmount();
        for task in self.inner.tasks.borrow_mut().drain(..) {
            task.unmount();
        }
    }
}

impl AppInner {
    fn render(&self) {
        let tasks = self.view.render(|| {
            let renders = RenderCounts::bump(&self.counts.app);
            tracing::debug!(renders, "render TodoApp");
            self.todo_list.observable().observe();
            if let Some(theme) = &self.theme {
                theme.observable().observe();
            }
            self.todo_list.tasks()
        });
        self.label.render();
        self.reconcile(&tasks);
    }

    fn reconcile(&self, tasks: &[Rc<Task>]) {
        let mut previous = mem::take(&mut *self.tasks.borrow_mut());
        let mut next = Vec::with_capacity(tasks.len());
        for task in tasks {
            let view = match previous.iter().position(|v| v.uid() == task.uid()) {
                Some(index) => previous.swap_remove(index),
                None => TaskView::new(&self.runtime, Rc::clone(task), Rc::clone(&self.counts)),
            };
            view.render();
            next.push(view);
        }
        for stale in previous {
            stale.unmount();
        }
        *self.tasks.borrow_mut() = next;
    }
}

// ─── ThemeLabel ──────────────────────────────────────────────────────────────

struct LabelInner {
    view: TrackedView,
    theme: Option<Rc<ThemeManager>>,
    counts: Rc<RenderCounts>,
    text: RefCell<String>,
}

impl LabelInner {
    fn render(&self) {
        self.view.render(|| {
            let renders = RenderCounts::bump(&self.counts.theme_label);
            tracing::debug!(renders, "render ThemeLabel");
            let text = match &self.theme {
                Some(theme) => {
                    theme.observable().observe();
                    format!("Theme{}", theme.theme())
                }
                None => "Themeundefined".to_string(),
            };
            *self.text.borrow_mut() = text;
        });
    }
}

/// Shows the current theme name.
pub struct ThemeLabel {
    inner: Rc<LabelInner>,
}

impl ThemeLabel {
    fn new(runtime: &Runtime, theme: Option<Rc<ThemeManager>>, counts: Rc<RenderCounts>) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<LabelInner>| {
            let weak = weak.clone();
            LabelInner {
                view: TrackedView::new(runtime, move || {
                    if let Some(label) = weak.upgrade() {
                        label.render();
                    }
                }),
                theme,
                counts,
                text: RefCell::new(String::new()),
            }
        });
        Self { inner }
    }

    fn render(&self) {
        self.inner.render();
    }

    fn unmount(&self) {
        self.inner.view.unmount();
    }

    #[must_use]
    pub fn reaction(&self) -> &Reaction {
        self.inner.view.reaction()
    }

    #[must_use]
    pub fn output(&self) -> String {
        self.inner.text.borrow().clone()
    }
}

// ─── TaskView ────────────────────────────────────────────────────────────────

struct TaskInner {
    view: TrackedView,
    task: Rc<Task>,
    counts: Rc<RenderCounts>,
    text: RefCell<String>,
}

impl TaskInner {
    fn render(&self) {
        self.view.render(|| {
            let renders = RenderCounts::bump(&self.counts.task);
            tracing::debug!(renders, task = %self.task.uid(), "render TaskView");
            self.task.observable().observe();
            *self.text.borrow_mut() =
                format!("Task{}, text: {}", self.task.uid(), self.task.text());
        });
    }
}

/// Shows one task.
pub struct TaskView {
    inner: Rc<TaskInner>,
}

impl TaskView {
    fn new(runtime: &Runtime, task: Rc<Task>, counts: Rc<RenderCounts>) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<TaskInner>| {
            let weak = weak.clone();
            TaskInner {
                view: TrackedView::new(runtime, move || {
                    if let Some(view) = weak.upgrade() {
                        view.render();
                    }
                }),
                task,
                counts,
                text: RefCell::new(String::new()),
            }
        });
        Self { inner }
    }

    fn render(&self) {
        self.inner.render();
    }

    fn unmount(&self) {
        self.inner.view.unmount();
    }

    #[must_use]
    pub fn uid(&self) -> TaskUid {
        self.inner.task.uid()
    }

    #[must_use]
    pub fn output(&self) -> String {
        self.inner.text.borrow().clone()
    }
}
