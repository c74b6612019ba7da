use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::StockCache;
use crate::db::models::Hold;
use crate::db::queries;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::retry::retry_on_contention;
use crate::services::availability;

/// Lifetime of a reservation before the sweep reclaims it.
pub const HOLD_TTL_SECONDS: i64 = 120;

#[derive(Clone)]
pub struct HoldService {
    pool: PgPool,
    cache: StockCache,
    metrics: Arc<Metrics>,
}

impl HoldService {
    pub fn new(pool: PgPool, cache: StockCache, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            cache,
            metrics,
        }
    }

    /// Reserve `quantity` units of a product for `HOLD_TTL_SECONDS`.
    ///
    /// The availability check runs under an exclusive lock on the product
    /// row, so concurrent requests for one product serialize and cannot both
    /// observe the same free quantity. Requests for different products
    /// proceed in parallel.
    pub async fn create_with_validation(
        &self,
        product_id: i64,
        quantity: i64,
    ) -> Result<Hold, AppError> {
        let started = Instant::now();
        let hold = retry_on_contention(&self.metrics, "holds.create", || {
            self.create_attempt(product_id, quantity)
        })
        .await?;

        self.metrics.record_hold_creation(started.elapsed());
        self.cache.invalidate(product_id).await;

        tracing::info!(
            hold_id = hold.id,
            product_id,
            quantity,
            expires_at = %hold.expires_at,
            "hold created"
        );
        Ok(hold)
    }

    async fn create_attempt(&self, product_id: i64, quantity: i64) -> Result<Hold, AppError> {
        let mut tx = self.pool.begin().await?;

        let product = queries::get_product_for_update(&mut tx, product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {product_id} not found")))?;

        let now = Utc::now();
        let available = availability::available_stock_in_tx(&mut tx, &product, now).await?;
        if quantity > available {
            return Err(AppError::BadRequest(
                "Insufficient stock available".to_string(),
            ));
        }

        let expires_at = now + Duration::seconds(HOLD_TTL_SECONDS);
        let hold = queries::insert_hold(&mut tx, product_id, quantity, expires_at).await?;
        tx.commit().await?;

        Ok(hold)
    }

    /// Return a hold's quantity to the available pool. Invoked only when a
    /// payment for the order referencing it fails.
    pub async fn release(&self, hold_id: i64) -> Result<(), AppError> {
        if let Some(product_id) = queries::release_hold(&self.pool, hold_id).await? {
            self.cache.invalidate(product_id).await;
        }
        Ok(())
    }

    /// Consume every past-due, unused hold. Idempotent: re-running over the
    /// same rows transitions nothing.
    ///
    /// Returns the number of holds transitioned and the distinct products
    /// touched. Runs under the contention retry because the UPDATE can
    /// collide with hold-row locks taken by order creation.
    pub async fn process_expired(&self) -> Result<(usize, Vec<i64>), AppError> {
        let (count, product_ids) =
            retry_on_contention(&self.metrics, "holds.process_expired", || {
                self.sweep_attempt()
            })
            .await?;

        if count > 0 {
            self.cache.invalidate_many(&product_ids).await;
        }

        tracing::info!(
            expired_count = count,
            product_ids = ?product_ids,
            "processed expired holds"
        );
        Ok((count, product_ids))
    }

    async fn sweep_attempt(&self) -> Result<(usize, Vec<i64>), AppError> {
        let transitioned = queries::expire_due_holds(&self.pool, Utc::now()).await?;

        let count = transitioned.len();
        let mut product_ids: Vec<i64> = transitioned.into_iter().map(|(_, pid)| pid).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        Ok((count, product_ids))
    }
}
