use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// Callback invoked after a [`State`] changes.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Observable state cell with interior mutability.
///
/// `State<T>` uses `Arc<RwLock<T>>` internally, making it cheap to clone and
/// safe to share with async tasks. Every write bumps a monotonically
/// increasing version and notifies subscribers once the write lock has been
/// released, so listeners are free to read the cell again.
///
/// # Example
///
/// ```
/// use common_hooks::state::State;
///
/// let count = State::new(0);
/// let seen = count.clone();
/// let _sub = count.subscribe(move || println!("count is now {}", seen.get()));
///
/// count.update(|v| *v += 1);
/// assert_eq!(count.get(), 1);
/// assert_eq!(count.version(), 1);
/// ```
pub struct State<T> {
    inner: Arc<RwLock<T>>,
    version: Arc<AtomicU64>,
    listeners: Arc<Listeners>,
}

impl<T> State<T> {
    /// Create a new state with the given value
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
            version: Arc::new(AtomicU64::new(0)),
            listeners: Arc::new(Listeners::default()),
        }
    }

    /// Get a clone of the current value
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Set a new value
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            *guard = value;
        }
        self.changed();
    }

    /// Update the value using a closure
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard);
        }
        self.changed();
    }

    /// Number of writes since creation.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Register a listener that runs after every write.
    ///
    /// The listener stays registered until the returned [`Subscription`]
    /// is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub(crate) fn version_handle(&self) -> VersionHandle {
        VersionHandle(Arc::clone(&self.version))
    }

    pub(crate) fn subscribe_listener(&self, listener: Listener) -> Subscription {
        self.listeners.add(listener)
    }

    fn changed(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.listeners.notify();
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            version: Arc::clone(&self.version),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T: Default> Default for State<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with(|value| {
            f.debug_struct("State")
                .field("value", value)
                .field("version", &self.version())
                .finish()
        })
    }
}

/// Shared read-only view of a state's version counter.
#[derive(Debug, Clone)]
pub struct VersionHandle(Arc<AtomicU64>);

impl VersionHandle {
    /// Current version.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

impl Listeners {
    fn add(self: &Arc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        Subscription {
            listeners: Arc::downgrade(self),
            id,
        }
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(entry, _)| *entry != id);
    }

    fn notify(&self) {
        // Snapshot first: a listener may subscribe or unsubscribe while running.
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

/// Keeps a listener registered on a [`State`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<Listeners>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_version_counts_writes() {
        let state = State::new(String::new());
        state.set("a".into());
        state.update(|s| s.push('b'));
        assert_eq!(state.get(), "ab");
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_dropped_subscription_stops_notifications() {
        let state = State::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = state.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        state.set(1);
        drop(sub);
        state.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_read_state() {
        let state = State::new(1);
        let seen = Arc::new(AtomicUsize::new(0));
        let (reader, sink) = (state.clone(), Arc::clone(&seen));
        let _sub = state.subscribe(move || sink.store(reader.get(), Ordering::SeqCst));

        state.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
