//! Thread-safe key→value cache with per-entry time-to-live.
//!
//! A pure optimization layer consulted before expensive or rate-limited
//! calls: contents live in memory only and are lost on restart, which is
//! acceptable because the cache is never a source of truth.
//!
//! A read past an entry's expiry is equivalent to absence and evicts the
//! entry, so stale values never linger beyond their first post-expiry read.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::resilience::{Clock, SystemClock};

/// Value plus absolute expiry instant.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe TTL cache.
///
/// Entries expire `ttl` after insertion; `insert` overwrites any existing
/// entry and resets its expiry. Clones share storage. Generic over [`Clock`]
/// so expiry can be tested without sleeping.
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash,
    C: Clock,
{
    entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    default_ttl: Duration,
    clock: C,
}

impl<K, V, C> Clone for TtlCache<K, V, C>
where
    K: Eq + Hash,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
            clock: self.clock.clone(),
        }
    }
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a cache with the given default TTL using the system clock.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash,
    V: Clone,
    C: Clock,
{
    /// Create a cache with a custom clock (useful for testing).
    pub fn with_clock(default_ttl: Duration, clock: C) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), default_ttl, clock }
    }

    /// Look up `key`, evicting and returning `None` if the entry expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if self.clock.now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert with the default TTL, overwriting any existing entry.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL, overwriting any existing entry.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.lock().insert(key, CacheEntry { value, expires_at });
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, including any not yet evicted past expiry.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("ttl cache lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::MockClock;

    fn cache(ttl: Duration) -> (TtlCache<String, i32, MockClock>, MockClock) {
        let clock = MockClock::new();
        (TtlCache::with_clock(ttl, clock.clone()), clock)
    }

    #[test]
    fn set_then_get_returns_value() {
        let (cache, _clock) = cache(Duration::from_secs(1));
        cache.insert("k".to_string(), 42);
        assert_eq!(cache.get(&"k".to_string()), Some(42));
    }

    #[test]
    fn expired_read_returns_none_and_evicts() {
        let (cache, clock) = cache(Duration::from_secs(1));
        cache.insert("k".to_string(), 42);

        clock.advance(Duration::from_millis(1500));

        assert_eq!(cache.get(&"k".to_string()), None);
        // The expired read removed the entry, not just hid it.
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_overwrites_and_resets_expiry() {
        let (cache, clock) = cache(Duration::from_secs(2));
        cache.insert("k".to_string(), 1);

        clock.advance(Duration::from_millis(1500));
        cache.insert("k".to_string(), 2);

        // Old expiry would have fired here; the rewrite pushed it out.
        clock.advance(Duration::from_millis(1000));
        assert_eq!(cache.get(&"k".to_string()), Some(2));
    }

    #[test]
    fn per_entry_ttl_overrides_default() {
        let (cache, clock) = cache(Duration::from_secs(60));
        cache.insert_with_ttl("short".to_string(), 1, Duration::from_secs(1));
        cache.insert("long".to_string(), 2);

        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.get(&"short".to_string()), None);
        assert_eq!(cache.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn invalidate_and_clear() {
        let (cache, _clock) = cache(Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        cache.invalidate(&"a".to_string());
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_access_is_safe() {
        let cache: TtlCache<String, u64> = TtlCache::new(Duration::from_secs(60));
        let mut handles = Vec::new();

        for i in 0..16u64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.insert(format!("key-{}", i % 4), i);
                cache.get(&format!("key-{}", i % 4))
            }));
        }

        for handle in handles {
            assert!(handle.await.is_ok());
        }
        assert_eq!(cache.len(), 4);
    }
}
