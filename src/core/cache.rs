use crate::core::quote::Quote;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct CacheRecord {
    quote: Quote,
    captured_at: Instant,
}

enum Freshness {
    Fresh,
    Stale,
    Expired,
}

/// Last-known quotes keyed by symbol.
///
/// A record younger than `ttl` is fresh and served by [`QuoteCache::get`].
/// Between `ttl` and `stale_ttl` it is only served by
/// [`QuoteCache::get_stale`], as a fallback when a live refresh fails. Older
/// records are purged the next time they are read.
#[derive(Clone)]
pub struct QuoteCache {
    inner: Arc<Mutex<HashMap<String, CacheRecord>>>,
    ttl: Duration,
    stale_ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration, stale_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            stale_ttl: stale_ttl.max(ttl),
        }
    }

    pub fn stale_ttl(&self) -> Duration {
        self.stale_ttl
    }

    fn freshness(&self, record: &CacheRecord) -> Freshness {
        let age = record.captured_at.elapsed();
        if age < self.ttl {
            Freshness::Fresh
        } else if age < self.stale_ttl {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Returns the quote only while it is fresh.
    pub async fn get(&self, symbol: &str) -> Option<Quote> {
        let mut cache = self.inner.lock().await;
        let record = *cache.get(symbol)?;
        match self.freshness(&record) {
            Freshness::Fresh => {
                debug!("Cache HIT for symbol: {}", symbol);
                Some(record.quote)
            }
            Freshness::Stale => {
                debug!("Cache entry past ttl for symbol: {}", symbol);
                None
            }
            Freshness::Expired => {
                debug!("Cache entry expired for symbol: {}", symbol);
                cache.remove(symbol);
                None
            }
        }
    }

    /// Returns the quote while it is fresh or stale-but-usable.
    pub async fn get_stale(&self, symbol: &str) -> Option<Quote> {
        let mut cache = self.inner.lock().await;
        let record = *cache.get(symbol)?;
        if let Freshness::Expired = self.freshness(&record) {
            debug!("Cache entry expired for symbol: {}", symbol);
            cache.remove(symbol);
            return None;
        }
        Some(record.quote)
    }

    pub async fn set(&self, symbol: &str, quote: Quote) {
        let record = CacheRecord {
            quote,
            captured_at: Instant::now(),
        };
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for symbol: {}", symbol);
        cache.insert(symbol.to_string(), record);
    }

    pub async fn clear(&self) {
        let mut cache = self.inner.lock().await;
        cache.clear();
        debug!("Cache CLEAR");
    }

    /// Records currently held, stale ones included.
    #[allow(clippy::len_without_is_empty)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio::time::advance;

    fn cache() -> QuoteCache {
        QuoteCache::new(Duration::from_secs(60), Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_get_after_set() {
        let cache = cache();
        assert!(cache.get("sh600000").await.is_none());

        let quote = Quote::from_close(dec!(10.50), dec!(10.00));
        cache.set("sh600000", quote).await;

        let cached = cache.get("sh600000").await.unwrap();
        assert_eq!(cached.price, quote.price);
        assert_eq!(cached, quote);
        assert!(cache.get("sh600001").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_window() {
        let cache = cache();
        let quote = Quote::from_close(dec!(11), dec!(10));
        cache.set("sh600000", quote).await;

        advance(Duration::from_secs(61)).await;
        assert!(cache.get("sh600000").await.is_none());
        assert_eq!(cache.get_stale("sh600000").await, Some(quote));

        // A miss on the fresh path must not drop the stale record
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_records_are_purged() {
        let cache = cache();
        cache
            .set("sh600000", Quote::from_close(dec!(11), dec!(10)))
            .await;

        advance(Duration::from_secs(301)).await;
        assert!(cache.get_stale("sh600000").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_stale_ttl_is_clamped_to_ttl() {
        let cache = QuoteCache::new(Duration::from_secs(60), Duration::from_secs(10));
        assert_eq!(cache.stale_ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = cache();
        cache.set("a", Quote::from_close(dec!(1), dec!(1))).await;
        cache.set("b", Quote::from_close(dec!(2), dec!(2))).await;

        cache.clear().await;

        assert!(cache.get_stale("a").await.is_none());
        assert!(cache.get_stale("b").await.is_none());
    }
}
