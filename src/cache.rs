//! TTL + LRU cache for POI queries and route legs
//!
//! Keys are pre-normalized by the caller. Capacity and TTL are unified across
//! both caches: 10,000 entries, one hour.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
    /// Monotonic recency stamp; the lowest stamp is evicted first
    stamp: u64,
}

struct CacheInner<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_stamp: u64,
    hits: u64,
    misses: u64,
}

/// Thread-safe cache with per-entry TTL and least-recently-used eviction
pub struct TtlLruCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlLruCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_stamp: 0,
                hits: 0,
                misses: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => now > entry.expires_at,
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            return None;
        }

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        inner.hits += 1;
        let entry = inner.entries.get_mut(key).expect("entry checked above");
        entry.stamp = stamp;
        Some(entry.value.clone())
    }

    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let now = Instant::now();

        // Drop expired entries before considering eviction
        inner.entries.retain(|_, e| now <= e.expires_at);

        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(&key) {
            if let Some(lru_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.stamp)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&lru_key);
            }
        }

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                stamp,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put() {
        let cache: TtlLruCache<String, u32> = TtlLruCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.get(&"a".to_string()), None);

        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache: TtlLruCache<u32, u32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put(1, 10);
        cache.put(2, 20);

        // Touch 1 so 2 becomes least recently used
        assert_eq!(cache.get(&1), Some(10));

        cache.put(3, 30);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache: TtlLruCache<u32, u32> = TtlLruCache::new(10, Duration::ZERO);
        cache.put(1, 10);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_overwrite_same_key() {
        let cache: TtlLruCache<u32, u32> = TtlLruCache::new(2, Duration::from_secs(60));
        cache.put(1, 10);
        cache.put(1, 11);
        cache.put(2, 20);
        assert_eq!(cache.get(&1), Some(11));
        assert_eq!(cache.get(&2), Some(20));
    }
}
