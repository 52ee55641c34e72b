//! Capacity-bounded least-recently-used cache.

use crate::stats::CacheStats;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Least-recently-used cache holding at most `capacity` entries.
///
/// `get` and `insert` move the entry to the most recent position; overflow
/// evicts the least recent one. `peek` reads without touching.
pub struct LruCache<K, V> {
    entries: ::lru::LruCache<K, V>,
    stats: CacheStats,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: ::lru::LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Read an entry and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let value = self.entries.get(key);
        if value.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        value
    }

    /// Read an entry without touching it or updating statistics.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.peek(key)
    }

    /// Insert or replace an entry, evicting the least recently used entry if
    /// the cache is full. Returns the evicted key/value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }
        let evicted = self.entries.push(key, value);
        if evicted.is_some() {
            self.stats.evictions += 1;
        }
        evicted
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.pop(key)
    }

    /// Remove every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().rev().map(|(key, _)| key)
    }

    /// Drop every entry for which `keep` returns false. Returns the count.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(key, value)| !keep(*key, *value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            self.entries.pop(key);
        }
        doomed.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            ..self.stats
        }
    }

    pub(crate) fn record_miss(&mut self) {
        self.stats.misses += 1;
    }
}

impl<K: Eq + Hash, V> fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.entries.cap())
            .field("len", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
