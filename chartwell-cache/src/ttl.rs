//! Time-bounded cache layered on [`LruCache`].
//!
//! Entries carry their own TTL and insertion time. Expiry is lazy: an entry
//! whose age exceeds its TTL is deleted the next time it is read and reported
//! as absent. `purge_expired` sweeps eagerly.
//!
//! Every time-dependent method has an `_at` variant taking the current time,
//! which the plain variant calls with `Utc::now()`.

use crate::lru::LruCache;
use crate::stats::CacheStats;
use chrono::{DateTime, Utc};
use std::hash::Hash;
use std::time::Duration;

/// A cached value with its insertion time and time-to-live.
#[derive(Debug, Clone, PartialEq)]
pub struct TtlEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> TtlEntry<V> {
    /// Age of the entry at `now`. Zero if `now` precedes insertion.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.inserted_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) > self.ttl
    }
}

/// LRU cache whose entries also expire after a time-to-live.
pub struct TtlCache<K, V> {
    inner: LruCache<K, TtlEntry<V>>,
    default_ttl: Duration,
    expirations: u64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: LruCache::new(capacity),
            default_ttl,
            expirations: 0,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.get_at(key, Utc::now())
    }

    /// Read a live entry at `now`, touching it. An expired entry is removed.
    pub fn get_at(&mut self, key: &K, now: DateTime<Utc>) -> Option<&V> {
        let expired = self
            .inner
            .peek(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.inner.remove(key);
            self.inner.record_miss();
            self.expirations += 1;
            tracing::debug!("Cache entry expired on read");
            return None;
        }
        self.inner.get(key).map(|entry| &entry.value)
    }

    /// Insert with the default TTL.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, self.default_ttl, Utc::now());
    }

    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Utc::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, ttl: Duration, now: DateTime<Utc>) {
        let entry = TtlEntry {
            value,
            inserted_at: now,
            ttl,
        };
        if self.inner.insert(key, entry).is_some() {
            tracing::debug!(capacity = self.inner.capacity(), "Cache evicted least recent entry");
        }
    }

    /// Remove an entry. Returns true if one was present.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Remove every entry expired at `now`. Returns the count removed.
    pub fn purge_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.inner.retain(|_, entry| !entry.is_expired_at(now));
        self.expirations += removed as u64;
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            expirations: self.expirations,
            ..self.inner.stats()
        }
    }
}

impl<K: Eq + Hash, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("inner", &self.inner)
            .field("default_ttl", &self.default_ttl)
            .field("expirations", &self.expirations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn test_live_entry_is_returned() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert_at("k", 1, Duration::from_secs(60), t0());
        let later = t0() + TimeDelta::seconds(59);
        assert_eq!(cache.get_at(&"k", later), Some(&1));
    }

    #[test]
    fn test_expired_entry_is_absent_and_removed() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert_at("k", 1, Duration::from_secs(60), t0());
        let later = t0() + TimeDelta::seconds(61);
        assert_eq!(cache.get_at(&"k", later), None);
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_per_entry_ttl() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert_at("short", 1, Duration::from_secs(1), t0());
        cache.insert_at("long", 2, Duration::from_secs(120), t0());
        let later = t0() + TimeDelta::seconds(90);
        assert_eq!(cache.get_at(&"short", later), None);
        assert_eq!(cache.get_at(&"long", later), Some(&2));
    }

    #[test]
    fn test_capacity_still_applies() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.insert_at("a", 1, Duration::from_secs(60), t0());
        cache.insert_at("b", 2, Duration::from_secs(60), t0());
        cache.insert_at("c", 3, Duration::from_secs(60), t0());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at(&"a", t0()), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_purge_expired() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert_at("a", 1, Duration::from_secs(10), t0());
        cache.insert_at("b", 2, Duration::from_secs(100), t0());
        let removed = cache.purge_expired_at(t0() + TimeDelta::seconds(50));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clock_going_backwards_is_not_expiry() {
        let entry = TtlEntry {
            value: (),
            inserted_at: t0(),
            ttl: Duration::ZERO,
        };
        assert!(!entry.is_expired_at(t0() - TimeDelta::seconds(5)));
    }
}
