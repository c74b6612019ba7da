use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis;
pub mod stock;

pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use stock::StockCache;

/// String-keyed TTL store.
///
/// Every caller treats failures as advisory: a cache error is logged and the
/// authoritative database path is taken instead. Correctness never depends on
/// what this trait returns.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn has(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn forget(&self, key: &str) -> anyhow::Result<()>;

    async fn forget_many(&self, keys: &[String]) -> anyhow::Result<()> {
        for key in keys {
            self.forget(key).await?;
        }
        Ok(())
    }
}
