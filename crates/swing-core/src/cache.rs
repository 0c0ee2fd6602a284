//! Time-bounded caches for upstream data

use crate::config::DataConfig;
use cached::{Cached, TimedCache};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key: what was asked (`scope`), about whom (`subject`) and with which parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject: String,
    pub scope: &'static str,
    pub params: String,
}

impl CacheKey {
    pub fn new(subject: impl Into<String>, scope: &'static str, params: impl Serialize) -> Self {
        Self {
            subject: subject.into(),
            scope,
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

/// Shared TTL cache storing JSON values
#[derive(Clone)]
pub struct TtlCache {
    inner: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        // TimedCache evicts on read, so lookups need the write lock
        let mut cache = self.inner.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.inner.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Typed lookup; entries that no longer deserialize count as misses
    pub async fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!(subject = %key.subject, scope = key.scope, "Cache hit");
                Some(hit)
            },
            Err(e) => {
                debug!(subject = %key.subject, scope = key.scope, "Discarding stale cache entry: {e}");
                None
            },
        }
    }

    pub async fn insert_as<T: Serialize>(&self, key: CacheKey, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.insert(key, json).await;
        }
    }

    /// Return the cached value or run `fetcher` and cache its success
    pub async fn get_or_fetch<T, F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get_as(&key).await {
            return Ok(hit);
        }

        debug!(subject = %key.subject, scope = key.scope, "Cache miss");
        let value = fetcher().await?;
        self.insert_as(key, &value).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        let cache = self.inner.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Caches grouped by how quickly their data goes stale
#[derive(Clone)]
pub struct CacheTiers {
    /// Price history and latest quotes
    pub quotes: TtlCache,
    /// Headlines and financial ratios
    pub news: TtlCache,
    /// Sector constituent lists
    pub constituents: TtlCache,
}

impl CacheTiers {
    pub fn new(quotes_ttl: Duration, news_ttl: Duration, constituents_ttl: Duration) -> Self {
        Self {
            quotes: TtlCache::new(quotes_ttl),
            news: TtlCache::new(news_ttl),
            constituents: TtlCache::new(constituents_ttl),
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(
            Duration::from_secs(config.cache_ttl_quotes_secs),
            Duration::from_secs(config.cache_ttl_news_secs),
            Duration::from_secs(config.cache_ttl_constituents_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_creation() {
        let key = CacheKey::new("INFY.NS", "history", 400);
        assert_eq!(key.subject, "INFY.NS");
        assert_eq!(key.scope, "history");
        assert_eq!(key.params, "400");
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AUTO", "constituents", ());
        let tickers = vec!["M&M.NS".to_string(), "MARUTI.NS".to_string()];

        cache.insert_as(key.clone(), &tickers).await;
        let hit: Option<Vec<String>> = cache.get_as(&key).await;
        assert_eq!(hit, Some(tickers));

        let wrong_type: Option<f64> = cache.get_as(&key).await;
        assert!(wrong_type.is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_success_only() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let key = CacheKey::new("TCS.NS", "news", 10);

        let failed: Result<Vec<String>, String> = cache
            .get_or_fetch(key.clone(), || async { Err("feed down".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);

        let mut calls = 0;
        for _ in 0..2 {
            let headlines: Result<Vec<String>, String> = cache
                .get_or_fetch(key.clone(), || {
                    calls += 1;
                    async { Ok(vec!["TCS wins order".to_string()]) }
                })
                .await;
            assert_eq!(headlines.unwrap().len(), 1);
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_tiers_are_independent() {
        let tiers = CacheTiers::from_config(&DataConfig::default());
        let key = CacheKey::new("SBIN.NS", "history", 400);

        tiers.quotes.insert(key.clone(), serde_json::json!([1, 2, 3])).await;
        assert_eq!(tiers.quotes.len().await, 1);
        assert!(tiers.news.is_empty().await);
        assert!(tiers.constituents.is_empty().await);
        assert!(tiers.news.get(&key).await.is_none());
    }
}
