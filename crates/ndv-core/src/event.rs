//! Thread-safe change events with RAII listeners.
//!
//! # Invariants
//!
//! 1. Listeners are called in registration order.
//! 2. No internal lock is held while a callback runs, so a callback may
//!    fire, listen, or drop listeners on the same event.
//! 3. Dropping a [`Listener`] removes its callback before the next `fire`.
//! 4. A `Listener` that outlives its `Event` is inert.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EventInner<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// A multi-listener notification point.
pub struct Event<T> {
    inner: Arc<Mutex<EventInner<T>>>,
}

impl<T> Event<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EventInner {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register `callback`. It stays registered while the returned
    /// [`Listener`] is alive.
    #[must_use = "dropping the Listener unsubscribes immediately"]
    pub fn listen<F>(&self, callback: F) -> Listener
    where
        F: Fn(&T) + Send + Sync + 'static,
        T: 'static,
    {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        let weak: Weak<Mutex<EventInner<T>>> = Arc::downgrade(&self.inner);
        Listener {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().callbacks.retain(|(cid, _)| *cid != id);
                }
            })),
        }
    }

    /// Call every registered callback with `value`.
    pub fn fire(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .lock()
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(value);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().callbacks.len()
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// RAII guard for a registered callback.
pub struct Listener {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Listener {
    /// Unregister now. Equivalent to dropping.
    pub fn close(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
