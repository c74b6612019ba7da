use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::Cache;

/// Process-local TTL store. The default backend, and the one the test suites
/// substitute for the external store.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, expires_at)) if *expires_at > now => {
                    return Ok(Some(value.clone()))
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired entry: drop it lazily.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn forget(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn forget_many(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_forget() {
        let cache = MemoryCache::new();
        cache.put("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.has("k").await.unwrap());

        cache.forget("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.put("k", "v", Duration::from_millis(20)).await.unwrap();
        assert!(cache.has("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forget_many() {
        let cache = MemoryCache::new();
        cache.put("a", "1", Duration::from_secs(10)).await.unwrap();
        cache.put("b", "2", Duration::from_secs(10)).await.unwrap();
        cache.put("c", "3", Duration::from_secs(10)).await.unwrap();

        cache
            .forget_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert!(!cache.has("a").await.unwrap());
        assert!(!cache.has("b").await.unwrap());
        assert!(cache.has("c").await.unwrap());
    }
}
