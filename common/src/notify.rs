//! Listener registry shared by the durable stores and the wallet ledger.
//!
//! Callbacks are keyed by a monotonically increasing id. Registration hands
//! back a [`Subscription`] holding only a weak reference to the registry, so a
//! handle that outlives its store is harmless.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback<T>>,
}

/// A set of callbacks invoked with every dispatched value.
pub struct Listeners<T> {
    inner: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                callbacks: BTreeMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered callback with `value`.
    ///
    /// The callback list is snapshotted first, so callbacks may subscribe or
    /// unsubscribe without deadlocking; changes apply from the next dispatch.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self.lock().callbacks.values().cloned().collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

impl<T: 'static> Listeners<T> {
    /// Register `callback`. It stays registered until the returned handle is
    /// unsubscribed or dropped.
    #[must_use = "dropping the subscription unregisters the listener"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.insert(id, Arc::new(callback));
            id
        };
        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            active: AtomicBool::new(true),
            remove: Box::new(move |id| {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .callbacks
                        .remove(&id);
                }
            }),
        }
    }
}

/// Handle returned by a `subscribe` call.
///
/// [`Subscription::unsubscribe`] may be called any number of times; only the
/// first call has an effect. Dropping the handle unsubscribes as well.
pub struct Subscription {
    id: u64,
    active: AtomicBool,
    remove: Box<dyn Fn(u64) + Send + Sync>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            (self.remove)(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
