#![forbid(unsafe_code)]

//! Reference domain models built on [`Observable`].
//!
//! Each model wraps its own state and calls `mutate()` only when a setter
//! actually changes something. Getters do not observe; views call
//! `observable().observe()` explicitly while rendering.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ripple_core::{Observable, Runtime};

static NEXT_TASK_UID: AtomicU64 = AtomicU64::new(0);

/// Stable key of a [`Task`], used to reconcile task views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskUid(u64);

impl fmt::Display for TaskUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── TodoList ────────────────────────────────────────────────────────────────

pub struct TodoList {
    observable: Observable,
    title: RefCell<String>,
    tasks: RefCell<Vec<Rc<Task>>>,
}

impl TodoList {
    pub fn new(runtime: &Runtime, title: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            observable: runtime.observable("TodoList"),
            title: RefCell::new(title.into()),
            tasks: RefCell::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    #[must_use]
    pub fn title(&self) -> String {
        self.title.borrow().clone()
    }

    /// Setting the current title again does not mutate.
    pub fn set_title(&self, value: &str) {
        if *self.title.borrow() == value {
            return;
        }
        *self.title.borrow_mut() = value.to_string();
        self.observable.mutate();
    }

    pub fn add_task(&self, task: Rc<Task>) {
        self.tasks.borrow_mut().push(task);
        self.observable.mutate();
    }

    /// Dispose and drop every task.
    pub fn remove_all(&self) {
        let tasks = mem::take(&mut *self.tasks.borrow_mut());
        for task in &tasks {
            task.dispose();
        }
        self.observable.mutate();
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<Rc<Task>> {
        self.tasks.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for TodoList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoList")
            .field("title", &*self.title.borrow())
            .field("tasks", &self.tasks.borrow().len())
            .finish()
    }
}

// ─── Task ────────────────────────────────────────────────────────────────────

pub struct Task {
    uid: TaskUid,
    observable: Observable,
    text: RefCell<String>,
}

impl Task {
    pub fn new(runtime: &Runtime) -> Rc<Self> {
        Rc::new(Self {
            uid: TaskUid(NEXT_TASK_UID.fetch_add(1, Ordering::Relaxed)),
            observable: runtime.observable("Task"),
            text: RefCell::new(String::new()),
        })
    }

    #[must_use]
    pub fn uid(&self) -> TaskUid {
        self.uid
    }

    #[must_use]
    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    pub fn set_text(&self, value: &str) {
        if *self.text.borrow() == value {
            return;
        }
        *self.text.borrow_mut() = value.to_string();
        self.observable.mutate();
    }

    pub fn dispose(&self) {
        self.observable.dispose();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("uid", &self.uid)
            .field("text", &*self.text.borrow())
            .finish()
    }
}

// ─── ThemeManager ────────────────────────────────────────────────────────────

pub struct ThemeManager {
    observable: Observable,
    theme: RefCell<String>,
}

impl ThemeManager {
    pub fn new(runtime: &Runtime) -> Rc<Self> {
        Rc::new(Self {
            observable: runtime.observable("ThemeManager"),
            theme: RefCell::new(String::new()),
        })
    }

    #[must_use]
    pub fn observable(&self) -> &Observable {
        &self.observable
    }

    #[must_use]
    pub fn theme(&self) -> String {
        self.theme.borrow().clone()
    }

    pub fn set_theme(&self, value: &str) {
        if *self.theme.borrow() == value {
            return;
        }
        *self.theme.borrow_mut() = value.to_string();
        self.observable.mutate();
    }
}

impl fmt::Debug for ThemeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThemeManager")
            .field("theme", &*self.theme.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::RuntimeConfig;

    fn runtime() -> Runtime {
        Runtime::lab(RuntimeConfig::default())
            .expect("valid config")
            .0
    }

    #[test]
    fn unchanged_setters_do_not_mutate() {
        let rt = runtime();
        let todo = TodoList::new(&rt, "Todo");
        todo.set_title("Todo");
        assert!(!todo.observable().is_pending());
        todo.set_title("Other");
        assert!(todo.observable().is_pending());

        let theme = ThemeManager::new(&rt);
        theme.set_theme("");
        assert!(!theme.observable().is_pending());
    }

    #[test]
    fn remove_all_disposes_tasks() {
        let rt = runtime();
        let todo = TodoList::new(&rt, "Todo");
        let task = Task::new(&rt);
        todo.add_task(Rc::clone(&task));
        assert_eq!(todo.len(), 1);

        todo.remove_all();
        assert!(todo.is_empty());
        assert!(task.observable().is_disposed());
    }

    #[test]
    fn task_uids_are_unique() {
        let rt = runtime();
        let a = Task::new(&rt);
        let b = Task::new(&rt);
        assert_ne!(a.uid(), b.uid());
    }
}
