use std::sync::Arc;
use std::time::Duration;

use super::Cache;
use crate::metrics::Metrics;

/// TTL for available-stock snapshots. Staleness up to this bound is allowed;
/// writes invalidate rather than update.
pub const AVAILABLE_STOCK_TTL: Duration = Duration::from_secs(10);

pub fn available_stock_key(product_id: i64) -> String {
    format!("product_{product_id}_available_stock")
}

/// Typed facade over the raw cache for available-stock snapshots.
///
/// Every operation is best-effort: errors are logged at warn and swallowed so
/// the caller falls back to the database.
#[derive(Clone)]
pub struct StockCache {
    inner: Arc<dyn Cache>,
    metrics: Arc<Metrics>,
}

impl StockCache {
    pub fn new(inner: Arc<dyn Cache>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    pub async fn get_available(&self, product_id: i64) -> Option<i64> {
        let key = available_stock_key(product_id);
        match self.inner.get(&key).await {
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(value) => {
                    self.metrics.record_cache_hit();
                    Some(value)
                }
                Err(_) => {
                    tracing::warn!(key = %key, raw = %raw, "unparsable cached snapshot, discarding");
                    let _ = self.inner.forget(&key).await;
                    self.metrics.record_cache_miss();
                    None
                }
            },
            Ok(None) => {
                self.metrics.record_cache_miss();
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, falling back to database");
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    pub async fn put_available(&self, product_id: i64, available: i64) {
        let key = available_stock_key(product_id);
        if let Err(e) = self
            .inner
            .put(&key, &available.to_string(), AVAILABLE_STOCK_TTL)
            .await
        {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }

    pub async fn invalidate(&self, product_id: i64) {
        let key = available_stock_key(product_id);
        if let Err(e) = self.inner.forget(&key).await {
            tracing::warn!(key = %key, error = %e, "cache invalidation failed");
        }
    }

    pub async fn invalidate_many(&self, product_ids: &[i64]) {
        if product_ids.is_empty() {
            return;
        }
        let keys: Vec<String> = product_ids.iter().copied().map(available_stock_key).collect();
        if let Err(e) = self.inner.forget_many(&keys).await {
            tracing::warn!(count = keys.len(), error = %e, "batch cache invalidation failed");
        }
    }
}
