//! Per-owner key/value cache with an explicit dirty bit per key.
//!
//! [`StaleCache`] sits over a [`PersistentStore`] and keeps an in-memory
//! shadow of each entry so hot reads skip the store.
//!
//! # Invariants
//!
//! 1. A value is only valid for consumption when its entry is not dirty.
//! 2. An absent key is dirty.
//! 3. Every mutation is written through to the store before the shadow is
//!    updated; the shadow never holds state the store does not.
//! 4. A shadow is loaded from the store on first access to its key.
//! 5. The owner map lock is held only long enough to find an entry; work on
//!    one entry never blocks another.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ahash::{AHashMap, AHashSet};
use ndv_core::SourceId;
use parking_lot::Mutex;

type EntryKey = (SourceId, String);

fn entry_key(owner: SourceId, key: &str) -> EntryKey {
    (owner, key.to_owned())
}

// ─── Persistent store contract ───────────────────────────────────────────────

/// Durable key/value storage behind a [`StaleCache`].
///
/// Implementations must be safe to call from any thread.
pub trait PersistentStore<V>: Send + Sync {
    fn get(&self, owner: SourceId, key: &str) -> Option<V>;
    /// Store `value` and clear the dirty bit.
    fn set(&self, owner: SourceId, key: &str, value: V);
    /// True if marked dirty or absent.
    fn is_dirty(&self, owner: SourceId, key: &str) -> bool;
    fn mark_dirty(&self, owner: SourceId, key: &str);
    fn remove(&self, owner: SourceId, key: &str);
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct MemoryState<V> {
    values: AHashMap<EntryKey, V>,
    dirty: AHashSet<EntryKey>,
}

/// In-process [`PersistentStore`].
///
/// Clones share storage, which models reopening a document against the same
/// backing file.
#[derive(Debug)]
pub struct MemoryStore<V> {
    state: Arc<Mutex<MemoryState<V>>>,
    reads: Arc<AtomicUsize>,
}

impl<V> MemoryStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                values: AHashMap::new(),
                dirty: AHashSet::new(),
            })),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `get`/`is_dirty` calls served so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> Clone for MemoryStore<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reads: Arc::clone(&self.reads),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> PersistentStore<V> for MemoryStore<V> {
    fn get(&self, owner: SourceId, key: &str) -> Option<V> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.state.lock().values.get(&entry_key(owner, key)).cloned()
    }

    fn set(&self, owner: SourceId, key: &str, value: V) {
        let k = entry_key(owner, key);
        let mut state = self.state.lock();
        state.dirty.remove(&k);
        state.values.insert(k, value);
    }

    fn is_dirty(&self, owner: SourceId, key: &str) -> bool {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let k = entry_key(owner, key);
        let state = self.state.lock();
        state.dirty.contains(&k) || !state.values.contains_key(&k)
    }

    fn mark_dirty(&self, owner: SourceId, key: &str) {
        self.state.lock().dirty.insert(entry_key(owner, key));
    }

    fn remove(&self, owner: SourceId, key: &str) {
        let k = entry_key(owner, key);
        let mut state = self.state.lock();
        state.values.remove(&k);
        state.dirty.remove(&k);
    }
}

// ─── StaleCache ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Shadow<V> {
    value: Option<V>,
    dirty: bool,
}

/// `None` until the first access loads it from the store.
type Slot<V> = Arc<Mutex<Option<Shadow<V>>>>;

/// Dirty-tracking cache keyed by `(owner, key)`.
pub struct StaleCache<V> {
    store: Arc<dyn PersistentStore<V>>,
    entries: Mutex<AHashMap<EntryKey, Slot<V>>>,
}

impl<V: Clone + Send + 'static> StaleCache<V> {
    #[must_use]
    pub fn new(store: Arc<dyn PersistentStore<V>>) -> Self {
        Self {
            store,
            entries: Mutex::new(AHashMap::new()),
        }
    }

    /// A cache over a fresh [`MemoryStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn slot(&self, owner: SourceId, key: &str) -> Slot<V> {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(entry_key(owner, key)).or_default())
    }

    /// Run `f` on the loaded shadow of `(owner, key)`, holding its lock.
    fn with_shadow<R>(
        &self,
        owner: SourceId,
        key: &str,
        f: impl FnOnce(&mut Shadow<V>) -> R,
    ) -> R {
        let slot = self.slot(owner, key);
        let mut guard = slot.lock();
        let shadow = guard.get_or_insert_with(|| Shadow {
            dirty: self.store.is_dirty(owner, key),
            value: self.store.get(owner, key),
        });
        f(shadow)
    }

    #[must_use]
    pub fn get(&self, owner: SourceId, key: &str) -> Option<V> {
        self.with_shadow(owner, key, |s| s.value.clone())
    }

    /// Store `value` and clear the dirty bit.
    pub fn set(&self, owner: SourceId, key: &str, value: V) {
        self.with_shadow(owner, key, |s| {
            self.store.set(owner, key, value.clone());
            s.value = Some(value);
            s.dirty = false;
        });
    }

    pub fn mark_dirty(&self, owner: SourceId, key: &str) {
        self.with_shadow(owner, key, |s| {
            self.store.mark_dirty(owner, key);
            s.dirty = true;
        });
    }

    #[must_use]
    pub fn is_dirty(&self, owner: SourceId, key: &str) -> bool {
        self.with_shadow(owner, key, |s| s.dirty)
    }

    /// Drop the value; the entry reads as absent and dirty afterwards.
    pub fn remove(&self, owner: SourceId, key: &str) {
        let slot = self.slot(owner, key);
        let mut guard = slot.lock();
        self.store.remove(owner, key);
        *guard = Some(Shadow {
            value: None,
            dirty: true,
        });
    }

    /// Forget the in-memory shadows of `owner`. The store is untouched.
    pub fn evict_owner(&self, owner: SourceId) {
        self.entries.lock().retain(|(o, _), _| *o != owner);
    }

    /// Number of shadow entries currently held in memory.
    #[must_use]
    pub fn shadow_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl<V> fmt::Debug for StaleCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaleCache")
            .field("shadows", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "thumbnail_data";

    fn cache() -> (MemoryStore<u32>, StaleCache<u32>) {
        let store = MemoryStore::new();
        let cache = StaleCache::new(Arc::new(store.clone()));
        (store, cache)
    }

    #[test]
    fn absent_key_is_dirty() {
        let (_, cache) = cache();
        let owner = SourceId::new();
        assert!(cache.is_dirty(owner, KEY));
        assert_eq!(cache.get(owner, KEY), None);
    }

    #[test]
    fn set_clears_dirty_and_writes_through() {
        let (store, cache) = cache();
        let owner = SourceId::new();
        cache.mark_dirty(owner, KEY);
        cache.set(owner, KEY, 7);
        assert!(!cache.is_dirty(owner, KEY));
        assert_eq!(cache.get(owner, KEY), Some(7));
        assert_eq!(store.get(owner, KEY), Some(7));
        assert!(!store.is_dirty(owner, KEY));
    }

    #[test]
    fn mark_dirty_keeps_previous_value_readable() {
        let (store, cache) = cache();
        let owner = SourceId::new();
        cache.set(owner, KEY, 1);
        cache.mark_dirty(owner, KEY);
        assert!(cache.is_dirty(owner, KEY));
        assert_eq!(cache.get(owner, KEY), Some(1));
        assert!(store.is_dirty(owner, KEY));
    }

    #[test]
    fn remove_leaves_entry_absent_and_dirty() {
        let (store, cache) = cache();
        let owner = SourceId::new();
        cache.set(owner, KEY, 3);
        cache.remove(owner, KEY);
        assert_eq!(cache.get(owner, KEY), None);
        assert!(cache.is_dirty(owner, KEY));
        assert!(store.is_empty());
    }

    #[test]
    fn shadow_loads_lazily_once() {
        let (store, cache) = cache();
        let owner = SourceId::new();
        store.set(owner, KEY, 9);
        assert_eq!(store.read_count(), 0);
        for _ in 0..10 {
            assert_eq!(cache.get(owner, KEY), Some(9));
            assert!(!cache.is_dirty(owner, KEY));
        }
        assert_eq!(store.read_count(), 2);
    }

    #[test]
    fn reopened_cache_sees_persisted_state() {
        let (store, cache) = cache();
        let owner = SourceId::new();
        cache.set(owner, KEY, 5);
        let reopened: StaleCache<u32> = StaleCache::new(Arc::new(store.clone()));
        assert_eq!(reopened.get(owner, KEY), Some(5));
        assert!(!reopened.is_dirty(owner, KEY));
    }

    #[test]
    fn owners_and_keys_are_independent() {
        let (_, cache) = cache();
        let a = SourceId::new();
        let b = SourceId::new();
        cache.set(a, KEY, 1);
        cache.set(a, "histogram", 2);
        assert!(cache.is_dirty(b, KEY));
        assert_eq!(cache.get(a, "histogram"), Some(2));
        assert_eq!(cache.get(a, KEY), Some(1));
    }

    #[test]
    fn evict_owner_drops_only_its_shadows() {
        let (_, cache) = cache();
        let a = SourceId::new();
        let b = SourceId::new();
        cache.set(a, KEY, 1);
        cache.set(b, KEY, 2);
        cache.evict_owner(a);
        assert_eq!(cache.shadow_count(), 1);
        assert_eq!(cache.get(a, KEY), Some(1));
    }
}
