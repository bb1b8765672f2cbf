//! Bounded memoization for the predicate and round engines.
//!
//! Each predicate gets its own LRU cache of identical capacity. A cache hit
//! must be indistinguishable from recomputation, so only results derived
//! from resolved events are ever inserted: a query over a missing event is
//! answered negatively but never memoized, which keeps the caches valid as
//! the graph grows without any flush on insert.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::consensus::event::EventId;
use crate::consensus::round::ParentRoundInfo;

/// One `Mutex`-wrapped LRU map.
///
/// The lock is only held for the duration of a get or put, never across a
/// store call, so it cannot deadlock or block readers for long.
pub(crate) struct BoundedCache<K: std::hash::Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: std::hash::Hash + Eq, V: Clone> BoundedCache<K, V> {
    fn new(capacity: NonZeroUsize) -> Self {
        BoundedCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn put(&self, key: K, value: V) {
        self.inner.lock().unwrap().put(key, value);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// The memoization layer: one bounded cache per predicate.
pub(crate) struct PredicateCaches {
    pub(crate) ancestor: BoundedCache<(EventId, EventId), bool>,
    pub(crate) self_ancestor: BoundedCache<(EventId, EventId), bool>,
    pub(crate) strongly_see: BoundedCache<(EventId, EventId), bool>,
    pub(crate) oldest_self_ancestor: BoundedCache<(EventId, EventId), Option<EventId>>,
    pub(crate) parent_round: BoundedCache<EventId, ParentRoundInfo>,
    pub(crate) round: BoundedCache<EventId, i64>,
}

impl PredicateCaches {
    /// Allocate all caches at the given capacity (clamped to at least 1).
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        PredicateCaches {
            ancestor: BoundedCache::new(capacity),
            self_ancestor: BoundedCache::new(capacity),
            strongly_see: BoundedCache::new(capacity),
            oldest_self_ancestor: BoundedCache::new(capacity),
            parent_round: BoundedCache::new(capacity),
            round: BoundedCache::new(capacity),
        }
    }
}
