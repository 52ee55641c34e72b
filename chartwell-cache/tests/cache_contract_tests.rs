//! Cache contract tests
//!
//! - capacity 3: a 4th insert evicts exactly the least recently touched key
//! - a read before the 4th insert protects the key that was read
//! - a read after the TTL returns nothing although nothing was removed

use chartwell_cache::{LruCache, TtlCache};
use chrono::{TimeDelta, Utc};
use std::time::Duration;

#[test]
fn test_fourth_insert_evicts_exactly_one() {
    let mut cache = LruCache::new(3);
    for key in ["jan", "feb", "mar"] {
        cache.insert(key.to_string(), key.len());
    }
    cache.insert("apr".to_string(), 3);

    let remaining: Vec<_> = cache.keys().cloned().collect();
    assert_eq!(remaining, vec!["feb", "mar", "apr"]);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_touch_before_fourth_insert_protects_key() {
    let mut cache = LruCache::new(3);
    for key in ["jan", "feb", "mar"] {
        cache.insert(key.to_string(), key.len());
    }
    assert!(cache.get(&"jan".to_string()).is_some());
    cache.insert("apr".to_string(), 3);

    assert!(cache.contains(&"jan".to_string()));
    assert!(!cache.contains(&"feb".to_string()));
}

#[test]
fn test_read_after_ttl_is_absent() {
    let ttl = Duration::from_millis(500);
    let mut cache = TtlCache::new(10, ttl);
    let now = Utc::now();
    cache.insert_at("sales".to_string(), vec![1.0, 2.0], ttl, now);

    assert!(cache.get_at(&"sales".to_string(), now).is_some());
    let expired_at = now + TimeDelta::milliseconds(501);
    assert!(cache.get_at(&"sales".to_string(), expired_at).is_none());
    assert_eq!(cache.stats().expirations, 1);
}
