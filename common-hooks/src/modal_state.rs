//! Named modal visibility flags.

use std::collections::BTreeMap;

use log::warn;

use crate::reactive::Effect;
use crate::state::State;

/// Open/closed flag per named modal.
///
/// Cheap to clone; clones share state. Names are fixed at construction and
/// commands for any other name are ignored.
///
/// # Example
///
/// ```
/// use common_hooks::modal_state::ModalState;
///
/// let modals = ModalState::new(["confirm", "details"]);
/// let mut selected = 0;
///
/// modals.open_with("details", || selected = 2);
/// assert!(modals.is_open("details"));
/// assert!(!modals.is_open("confirm"));
/// assert_eq!(selected, 2);
///
/// modals.close("details");
/// assert!(!modals.is_open("details"));
/// ```
#[derive(Clone, Debug)]
pub struct ModalState {
    list: State<BTreeMap<String, bool>>,
}

impl ModalState {
    /// Create the flags for `names`, all closed.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = names.into_iter().map(|name| (name.into(), false)).collect();
        Self {
            list: State::new(list),
        }
    }

    pub fn open(&self, name: &str) {
        self.set(name, true);
    }

    /// Run `before`, then open the modal.
    pub fn open_with(&self, name: &str, before: impl FnOnce()) {
        before();
        self.set(name, true);
    }

    pub fn close(&self, name: &str) {
        self.set(name, false);
    }

    /// Run `before`, then close the modal.
    pub fn close_with(&self, name: &str, before: impl FnOnce()) {
        before();
        self.set(name, false);
    }

    /// Close every modal.
    pub fn close_all(&self) {
        self.list.update(|list| list.values_mut().for_each(|open| *open = false));
    }

    /// Set one flag directly.
    pub fn set(&self, name: &str, open: bool) {
        if !self.list.with(|list| list.contains_key(name)) {
            warn!("ModalState: unknown modal '{}'", name);
            return;
        }
        self.list.update(|list| {
            if let Some(flag) = list.get_mut(name) {
                *flag = open;
            }
        });
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.list.with(|list| list.get(name).copied().unwrap_or(false))
    }

    /// Snapshot of every flag.
    pub fn list(&self) -> BTreeMap<String, bool> {
        self.list.get()
    }

    /// Run `listener` now and after every flag change.
    pub fn subscribe<F>(&self, listener: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new(&[&self.list], listener)
    }
}
