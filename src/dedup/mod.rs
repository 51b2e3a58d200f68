//! Two-tier record of which feed entries have already been notified.
//!
//! Lookups go to an in-memory [`TtlCache`] first and fall back to the durable
//! [`CheckStore`]. Durable hits are back-filled into memory for 24 hours.
//! Writes go to both tiers through [`DedupCache::record_checked`], which is
//! the only place check records are written.

mod ttl;

pub use ttl::TtlCache;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{Database, FeedCheckRecord};

/// Durable tier of the dedup cache.
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn find_check(&self, source_url: &str, feed_url: &str)
        -> Result<Option<FeedCheckRecord>>;

    /// Bump `last_checked` on the existing record for the pair.
    async fn touch_check(
        &self,
        source_url: &str,
        feed_url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<FeedCheckRecord>>;

    async fn insert_check(&self, record: &FeedCheckRecord) -> Result<()>;
}

#[async_trait]
impl CheckStore for Database {
    async fn find_check(
        &self,
        source_url: &str,
        feed_url: &str,
    ) -> Result<Option<FeedCheckRecord>> {
        self.find_feed_check(source_url, feed_url).await
    }

    async fn touch_check(
        &self,
        source_url: &str,
        feed_url: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<FeedCheckRecord>> {
        self.touch_feed_check(source_url, feed_url, checked_at).await
    }

    async fn insert_check(&self, record: &FeedCheckRecord) -> Result<()> {
        self.insert_feed_check(record).await
    }
}

/// Deterministic cache key for a `(source, entry)` pair: the SHA-256 hex
/// digest of the compact JSON `{"sourceURL":..,"feedURL":..}`, fields in
/// that order.
pub fn cache_key(source_url: &str, feed_url: &str) -> String {
    // `json!` sorts object keys, so the object is assembled by hand and only
    // the values go through serde_json for escaping.
    let key = format!(
        r#"{{"sourceURL":{},"feedURL":{}}}"#,
        serde_json::Value::from(source_url),
        serde_json::Value::from(feed_url),
    );
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

pub struct DedupCache {
    store: Arc<dyn CheckStore>,
    cache: TtlCache<FeedCheckRecord>,
}

impl DedupCache {
    /// Lifetime of an in-memory entry.
    pub const TTL: Duration = Duration::from_secs(60 * 60 * 24);

    pub fn new(store: Arc<dyn CheckStore>, capacity: NonZeroUsize) -> Self {
        Self {
            store,
            cache: TtlCache::new(capacity),
        }
    }

    /// Look up the check record for a pair.
    ///
    /// A memory hit never touches the durable store. A durable hit is
    /// back-filled into memory.
    pub async fn get(&self, source_url: &str, feed_url: &str) -> Result<Option<FeedCheckRecord>> {
        let key = cache_key(source_url, feed_url);
        if let Some(record) = self.cache.get(&key) {
            return Ok(Some(record));
        }

        let record = self.store.find_check(source_url, feed_url).await?;
        if let Some(record) = &record {
            self.cache.set(key, record.clone(), Self::TTL);
        }
        Ok(record)
    }

    /// Record that the pair was checked now.
    ///
    /// With `has_prior_record` the existing durable record is updated; if it
    /// has disappeared in the meantime a new one is inserted. Without it a
    /// record is inserted (an upsert on the pair). Either way the memory tier
    /// is refreshed. `last_checked` is truncated to the millisecond precision
    /// of the durable store so both tiers hold the same record.
    pub async fn set(&self, record: &FeedCheckRecord, has_prior_record: bool) -> Result<FeedCheckRecord> {
        let mut checked = FeedCheckRecord {
            last_checked: Utc::now().trunc_subsecs(3),
            ..record.clone()
        };

        let touched = if has_prior_record {
            self.store
                .touch_check(&checked.source_url, &checked.feed_url, checked.last_checked)
                .await?
        } else {
            None
        };
        match touched {
            Some(updated) => checked = updated,
            None => self.store.insert_check(&checked).await?,
        }

        self.cache.set(
            cache_key(&checked.source_url, &checked.feed_url),
            checked.clone(),
            Self::TTL,
        );
        Ok(checked)
    }

    /// Record that an entry of a source has been notified.
    pub async fn record_checked(
        &self,
        source_url: &str,
        feed_url: &str,
        has_prior_record: bool,
    ) -> Result<FeedCheckRecord> {
        self.set(&FeedCheckRecord::new(source_url, feed_url), has_prior_record)
            .await
    }

    /// Whether an entry with this lookup result must be skipped.
    ///
    /// Any existing record means the entry was already notified; the age of
    /// the record does not matter.
    pub fn is_seen(record: Option<&FeedCheckRecord>) -> bool {
        record.is_some()
    }

    /// Number of entries currently held in memory.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOURCE: &str = "https://example.com/feed.xml";

    /// Wraps the SQLite store and counts durable lookups.
    struct CountingStore {
        db: Database,
        finds: AtomicUsize,
    }

    #[async_trait]
    impl CheckStore for CountingStore {
        async fn find_check(
            &self,
            source_url: &str,
            feed_url: &str,
        ) -> Result<Option<FeedCheckRecord>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            self.db.find_check(source_url, feed_url).await
        }

        async fn touch_check(
            &self,
            source_url: &str,
            feed_url: &str,
            checked_at: DateTime<Utc>,
        ) -> Result<Option<FeedCheckRecord>> {
            self.db.touch_check(source_url, feed_url, checked_at).await
        }

        async fn insert_check(&self, record: &FeedCheckRecord) -> Result<()> {
            self.db.insert_check(record).await
        }
    }

    async fn setup() -> (Arc<CountingStore>, DedupCache) {
        let store = Arc::new(CountingStore {
            db: Database::open(":memory:").await.unwrap(),
            finds: AtomicUsize::new(0),
        });
        let cache = DedupCache::new(store.clone(), NonZeroUsize::new(100).unwrap());
        (store, cache)
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = cache_key(SOURCE, "https://example.com/1");
        assert_eq!(a, cache_key(SOURCE, "https://example.com/1"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, cache_key(SOURCE, "https://example.com/2"));
        // Field boundaries are part of the key
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }

    #[test]
    fn test_cache_key_hashes_source_before_feed() {
        let expected = format!(
            "{:x}",
            Sha256::digest(br#"{"sourceURL":"a","feedURL":"b"}"#)
        );
        assert_eq!(cache_key("a", "b"), expected);

        let escaped = format!(
            "{:x}",
            Sha256::digest(br#"{"sourceURL":"https://x.test/\"q\"","feedURL":"b"}"#)
        );
        assert_eq!(cache_key(r#"https://x.test/"q""#, "b"), escaped);
    }

    #[tokio::test]
    async fn test_unseen_pair_returns_none_and_set_inserts_one() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";

        assert!(cache.get(SOURCE, link).await.unwrap().is_none());
        cache.record_checked(SOURCE, link, false).await.unwrap();

        assert_eq!(store.db.count_feed_checks(SOURCE).await.unwrap(), 1);
        assert!(cache.get(SOURCE, link).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_twice_never_duplicates() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";

        let first = cache.record_checked(SOURCE, link, false).await.unwrap();
        let second = cache.record_checked(SOURCE, link, true).await.unwrap();
        // A stale "no prior record" answer converges as well
        cache.record_checked(SOURCE, link, false).await.unwrap();

        assert_eq!(store.db.count_feed_checks(SOURCE).await.unwrap(), 1);
        assert!(second.last_checked >= first.last_checked);
    }

    #[tokio::test]
    async fn test_memory_record_matches_durable_record() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";

        let mut previous = cache.record_checked(SOURCE, link, false).await.unwrap();
        for _ in 0..20 {
            let current = cache.record_checked(SOURCE, link, true).await.unwrap();
            assert!(current.last_checked >= previous.last_checked);

            let durable = store.db.find_feed_check(SOURCE, link).await.unwrap();
            assert_eq!(durable.as_ref(), Some(&current));
            let cached = cache.get(SOURCE, link).await.unwrap();
            assert_eq!(cached, durable);
            previous = current;
        }
        assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_distinct_entries_of_one_source_get_distinct_records() {
        let (store, cache) = setup().await;

        cache
            .record_checked(SOURCE, "https://example.com/1", false)
            .await
            .unwrap();
        cache
            .record_checked(SOURCE, "https://example.com/2", false)
            .await
            .unwrap();
        let touched = cache
            .record_checked(SOURCE, "https://example.com/2", true)
            .await
            .unwrap();

        assert_eq!(touched.feed_url, "https://example.com/2");
        assert_eq!(store.db.count_feed_checks(SOURCE).await.unwrap(), 2);
        let first = store
            .db
            .find_feed_check(SOURCE, "https://example.com/1")
            .await
            .unwrap()
            .unwrap();
        assert!(first.last_checked <= touched.last_checked);
    }

    #[tokio::test]
    async fn test_prior_record_missing_from_store_is_inserted() {
        let (store, cache) = setup().await;
        cache
            .record_checked(SOURCE, "https://example.com/gone", true)
            .await
            .unwrap();
        assert_eq!(store.db.count_feed_checks(SOURCE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_hit_skips_durable_store() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";
        cache.record_checked(SOURCE, link, false).await.unwrap();

        assert!(cache.get(SOURCE, link).await.unwrap().is_some());
        assert!(cache.get(SOURCE, link).await.unwrap().is_some());
        assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_durable_hit_backfills_memory() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";
        store
            .db
            .insert_feed_check(&FeedCheckRecord::new(SOURCE, link))
            .await
            .unwrap();
        assert_eq!(cache.cached_len(), 0);

        assert!(cache.get(SOURCE, link).await.unwrap().is_some());
        assert_eq!(cache.cached_len(), 1);
        assert!(cache.get(SOURCE, link).await.unwrap().is_some());
        assert_eq!(store.finds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_durable_miss_is_not_cached() {
        let (store, cache) = setup().await;
        let link = "https://example.com/1";

        assert!(cache.get(SOURCE, link).await.unwrap().is_none());
        assert!(cache.get(SOURCE, link).await.unwrap().is_none());
        assert_eq!(cache.cached_len(), 0);
        assert_eq!(store.finds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_record_checked_just_now_is_still_seen() {
        // A "last_checked < now" comparison would let a record stamped at
        // the current instant through; existence alone decides.
        let (_store, cache) = setup().await;
        let link = "https://example.com/1";
        let mut record = cache.record_checked(SOURCE, link, false).await.unwrap();
        record.last_checked = Utc::now() + chrono::Duration::hours(1);

        assert!(DedupCache::is_seen(Some(&record)));
        let fetched = cache.get(SOURCE, link).await.unwrap();
        assert!(DedupCache::is_seen(fetched.as_ref()));
        assert!(!DedupCache::is_seen(None));
    }
}
