//! Derived values and side effects on top of [`State`].
//!
//! - [`Effect`] re-runs a callback whenever one of its dependencies changes.
//! - [`Memo`] is a pull-based derived value: it recomputes on read, and only
//!   when a dependency has been written since the cached value was produced.
//! - [`batch`] defers effect re-runs until a group of writes has finished.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::state::{Listener, State, Subscription, VersionHandle};

/// Something an [`Effect`] or [`Memo`] can depend on.
pub trait Tracked: Send + Sync {
    /// Shared handle to the version counter.
    fn version_handle(&self) -> VersionHandle;

    /// Register a change listener.
    fn subscribe_listener(&self, listener: Listener) -> Subscription;
}

impl<T: Send + Sync> Tracked for State<T> {
    fn version_handle(&self) -> VersionHandle {
        State::version_handle(self)
    }

    fn subscribe_listener(&self, listener: Listener) -> Subscription {
        State::subscribe_listener(self, listener)
    }
}

// =============================================================================
// Effect
// =============================================================================

struct EffectInner {
    id: u64,
    callback: Box<dyn Fn() + Send + Sync>,
}

impl EffectInner {
    fn run(&self) {
        (self.callback)();
    }
}

/// A reactive side effect.
///
/// The callback runs once on creation and again after any dependency is
/// written. Inside a [`batch`], repeated triggers collapse into one run at
/// the end of the batch. Dropping the effect releases its subscriptions.
///
/// # Example
///
/// ```
/// use common_hooks::reactive::Effect;
/// use common_hooks::state::State;
///
/// let page = State::new(1);
/// let reader = page.clone();
/// let effect = Effect::new(&[&page], move || log::debug!("page {}", reader.get()));
///
/// page.set(2); // effect runs again
/// drop(effect);
/// page.set(3); // no longer observed
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
    _subscriptions: Vec<Subscription>,
}

impl Effect {
    /// Create an effect over `deps` and run it immediately.
    pub fn new<F>(deps: &[&dyn Tracked], callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let inner = Arc::new(EffectInner {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            callback: Box::new(callback),
        });

        let subscriptions = deps
            .iter()
            .map(|dep| {
                let weak = Arc::downgrade(&inner);
                dep.subscribe_listener(Arc::new(move || {
                    if let Some(effect) = weak.upgrade() {
                        schedule(effect);
                    }
                }))
            })
            .collect();

        inner.run();

        Self {
            inner,
            _subscriptions: subscriptions,
        }
    }

    /// Run the callback now, outside of any dependency change.
    pub fn run(&self) {
        self.inner.run();
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("dependencies", &self._subscriptions.len())
            .finish()
    }
}

// =============================================================================
// Batching
// =============================================================================

thread_local! {
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static QUEUED: RefCell<Vec<Arc<EffectInner>>> = const { RefCell::new(Vec::new()) };
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = BATCH_DEPTH.with(|d| {
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth
        });
        if depth == 0 && !std::thread::panicking() {
            flush();
        }
    }
}

/// Run `f` with effect re-runs deferred until it returns.
///
/// Each effect triggered inside the batch runs exactly once afterwards,
/// however many of its dependencies were written. Batches nest; only the
/// outermost one flushes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH_DEPTH.with(|d| d.set(d.get() + 1));
    let _guard = BatchGuard;
    f()
}

fn schedule(effect: Arc<EffectInner>) {
    if BATCH_DEPTH.with(Cell::get) == 0 {
        effect.run();
        return;
    }
    QUEUED.with(|queued| {
        let mut queued = queued.borrow_mut();
        if !queued.iter().any(|e| e.id == effect.id) {
            queued.push(effect);
        }
    });
}

fn flush() {
    loop {
        let next = QUEUED.with(|queued| {
            let mut queued = queued.borrow_mut();
            (!queued.is_empty()).then(|| queued.remove(0))
        });
        match next {
            Some(effect) => effect.run(),
            None => break,
        }
    }
}

// =============================================================================
// Memo
// =============================================================================

/// A derived value cached against the versions of its dependencies.
///
/// Versions only ever grow, so their sum changes whenever any dependency is
/// written. Reading a memo whose fingerprint is unchanged returns the cached
/// value without recomputing. The cache lock is never held while computing
/// or while a reader's closure runs, so both may read the memo again.
pub struct Memo<T> {
    versions: Vec<VersionHandle>,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    cache: Mutex<Option<(u64, Arc<T>)>>,
}

impl<T> Memo<T> {
    /// Create a memo over `deps`. Nothing is computed until the first read.
    pub fn new<F>(deps: &[&dyn Tracked], compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            versions: deps.iter().map(|dep| dep.version_handle()).collect(),
            compute: Box::new(compute),
            cache: Mutex::new(None),
        }
    }

    fn fingerprint(&self) -> u64 {
        self.versions.iter().map(VersionHandle::get).sum()
    }

    /// Shared handle to the current value, recomputing it first if stale.
    pub fn current(&self) -> Arc<T> {
        let fingerprint = self.fingerprint();
        if let Some((seen, value)) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            && *seen == fingerprint
        {
            return Arc::clone(value);
        }

        let value = Arc::new((self.compute)());
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((fingerprint, Arc::clone(&value)));
        value
    }

    /// Borrow the current value, recomputing it first if stale.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.current())
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        T::clone(&self.current())
    }
}

impl<T> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("dependencies", &self.versions.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&calls), calls)
    }

    #[test]
    fn test_effect_runs_on_creation_and_change() {
        let a = State::new(0);
        let (calls, sink) = counter();
        let _effect = Effect::new(&[&a], move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        a.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_batch_collapses_effect_runs() {
        let a = State::new(0);
        let b = State::new(String::new());
        let (calls, sink) = counter();
        let _effect = Effect::new(&[&a, &b], move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        batch(|| {
            a.set(1);
            b.set("x".into());
            a.set(2);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dropped_effect_stops_running() {
        let a = State::new(0);
        let (calls, sink) = counter();
        let effect = Effect::new(&[&a], move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        drop(effect);
        a.set(1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_memo_recomputes_only_when_stale() {
        let a = State::new(2);
        let (calls, sink) = counter();
        let reader = a.clone();
        let memo = Memo::new(&[&a], move || {
            sink.fetch_add(1, Ordering::SeqCst);
            reader.get() * 10
        });

        assert_eq!(memo.get(), 20);
        assert_eq!(memo.get(), 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        a.set(3);
        assert_eq!(memo.get(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_memo_reader_can_read_memo_again() {
        let a = State::new(4);
        let reader = a.clone();
        let memo = Memo::new(&[&a], move || reader.get() + 1);

        let nested = memo.with(|outer| *outer + memo.get());
        assert_eq!(nested, 10);
    }
}
