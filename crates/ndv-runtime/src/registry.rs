//! Reference-counted sharing of one resource per source identity.
//!
//! A [`SharedRegistry`] maps a [`SourceId`] to a single live instance of a
//! resource (typically an artifact source wrapping a compute processor) so
//! every consumer of the same source shares one computation.
//!
//! # Lifecycle
//!
//! - The first [`acquire`](SharedRegistry::acquire) for an id creates the
//!   resource and records the dispatcher it was created with.
//! - Later acquires return the same resource and bump its count. Acquiring
//!   with a different dispatcher is a programming error and panics.
//! - Dropping (or [`release`](SharedHandle::release)-ing) the last handle
//!   calls [`SharedResource::teardown`] and removes the entry.
//!
//! Registries are ordinary values; share one via `Arc` instead of a global.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use ndv_core::SourceId;
use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch::Dispatcher;

/// A resource that can be shared through a [`SharedRegistry`].
pub trait SharedResource: Send + Sync {
    /// Called once, when the last handle is released.
    fn teardown(&self) {}
}

struct Entry<T> {
    resource: Arc<T>,
    dispatcher: Arc<dyn Dispatcher>,
    refs: usize,
}

/// Process-wide map from source identity to one shared resource.
pub struct SharedRegistry<T> {
    entries: Mutex<AHashMap<SourceId, Entry<T>>>,
}

impl<T: SharedResource + 'static> SharedRegistry<T> {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(AHashMap::new()),
        })
    }

    /// Return a handle to the resource for `id`, creating it with `create` if
    /// none is live.
    ///
    /// `create` runs with the registry lock held and must not call back into
    /// this registry.
    ///
    /// # Panics
    ///
    /// If the live resource for `id` was created with a different dispatcher.
    pub fn acquire(
        self: &Arc<Self>,
        id: SourceId,
        dispatcher: &Arc<dyn Dispatcher>,
        create: impl FnOnce() -> T,
    ) -> SharedHandle<T> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(id).or_insert_with(|| {
            debug!(source = %id, "shared resource created");
            Entry {
                resource: Arc::new(create()),
                dispatcher: Arc::clone(dispatcher),
                refs: 0,
            }
        });
        assert!(
            Arc::ptr_eq(&entry.dispatcher, dispatcher),
            "source {id} acquired with a different dispatcher than it was created with"
        );
        entry.refs += 1;
        SharedHandle {
            registry: Arc::clone(self),
            id,
            resource: Arc::clone(&entry.resource),
            live: true,
        }
    }

    /// The live resource for `id`, without taking a reference.
    #[must_use]
    pub fn get(&self, id: SourceId) -> Option<Arc<T>> {
        self.entries
            .lock()
            .get(&id)
            .map(|entry| Arc::clone(&entry.resource))
    }

    /// Current reference count for `id` (0 if not live).
    #[must_use]
    pub fn ref_count(&self, id: SourceId) -> usize {
        self.entries.lock().get(&id).map_or(0, |entry| entry.refs)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release_id(&self, id: SourceId) {
        let removed = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&id) else {
                return;
            };
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs > 0 {
                return;
            }
            entries.remove(&id)
        };
        // Teardown runs outside the lock so it may touch the registry.
        if let Some(entry) = removed {
            debug!(source = %id, "shared resource torn down");
            entry.resource.teardown();
        }
    }
}

impl<T> fmt::Debug for SharedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("live", &self.entries.lock().len())
            .finish()
    }
}

/// A counted reference to a shared resource. Releases on drop.
pub struct SharedHandle<T: SharedResource + 'static> {
    registry: Arc<SharedRegistry<T>>,
    id: SourceId,
    resource: Arc<T>,
    live: bool,
}

impl<T: SharedResource + 'static> SharedHandle<T> {
    #[must_use]
    pub fn id(&self) -> SourceId {
        self.id
    }

    #[must_use]
    pub fn resource(&self) -> &Arc<T> {
        &self.resource
    }

    /// Release this reference now. Equivalent to dropping.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if std::mem::take(&mut self.live) {
            self.registry.release_id(self.id);
        }
    }
}

impl<T: SharedResource + 'static> std::ops::Deref for SharedHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.resource()
    }
}

impl<T: SharedResource + 'static> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<T: SharedResource + 'static> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle").field("id", &self.id).finish()
    }
}
