//! In-memory cache gateway for development and tests

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::CacheGateway;
use crate::domain::DomainResult;

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// `DashMap`-backed cache with lazy expiry on read.
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheGateway for InMemoryCache {
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> DomainResult<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> DomainResult<Option<Value>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Drop the read guard before removing the stale entry
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        Ok(None)
    }

    async fn del(&self, key: &str) -> DomainResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_del() {
        let cache = InMemoryCache::new();
        cache
            .set("chargepoint:CP001:info", json!({"vendor": "V"}), None)
            .await
            .unwrap();

        let v = cache.get("chargepoint:CP001:info").await.unwrap().unwrap();
        assert_eq!(v["vendor"], "V");

        cache.del("chargepoint:CP001:info").await.unwrap();
        assert!(cache.get("chargepoint:CP001:info").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = InMemoryCache::new();
        cache
            .set("k", json!(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        // Lazy expiry also removed the entry
        assert!(cache.is_empty());
    }
}
