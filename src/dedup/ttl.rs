use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct Expiring<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache whose entries expire after a per-entry time-to-live.
///
/// Capacity-bounded: once full, the least recently used entry is evicted.
/// Expired entries are dropped lazily on lookup. Time is read from the
/// tokio clock so tests can advance it deterministically.
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, Expiring<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the live value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock().put(key.into(), Expiring { value, expires_at });
    }

    /// Number of stored entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the LRU half-updated in a
    // way that matters for a cache, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Expiring<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> TtlCache<u32> {
        TtlCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_before_expiry() {
        let cache = cache(4);
        cache.set("a", 1, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = cache(4);
        cache.set("a", 1, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.get("a"), None);
        // Expired entry is dropped on lookup
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_refreshes_ttl() {
        let cache = cache(4);
        cache.set("a", 1, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set("a", 2, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = cache(2);
        cache.set("a", 1, Duration::from_secs(60));
        cache.set("b", 2, Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(1));
        cache.set("c", 3, Duration::from_secs(60));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(cache(1).get("nothing"), None);
    }
}
