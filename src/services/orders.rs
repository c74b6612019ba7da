use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use std::sync::Arc;

use crate::cache::StockCache;
use crate::db::models::{Order, OrderStatus};
use crate::db::queries;
use crate::error::{is_unique_violation, AppError};
use crate::metrics::Metrics;
use crate::retry::retry_on_contention;

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    cache: StockCache,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(pool: PgPool, cache: StockCache, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            cache,
            metrics,
        }
    }

    /// Convert a hold into a pending order, consuming the hold.
    ///
    /// The exclusive lock on the hold row serializes double-submits; the
    /// UNIQUE constraint on orders.hold_id backstops anything that slips
    /// past the is_used check.
    pub async fn create_from_hold(&self, hold_id: i64) -> Result<Order, AppError> {
        let order = retry_on_contention(&self.metrics, "orders.create", || {
            self.create_attempt(hold_id)
        })
        .await?;

        tracing::info!(order_id = order.id, hold_id, "order created");
        Ok(order)
    }

    async fn create_attempt(&self, hold_id: i64) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;

        let hold = queries::get_hold_for_update(&mut tx, hold_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hold {hold_id} not found")))?;

        if hold.expires_at <= Utc::now() {
            return Err(AppError::BadRequest("Hold has expired".to_string()));
        }
        if hold.is_used {
            return Err(AppError::BadRequest("Hold has already been used".to_string()));
        }

        let order = match queries::insert_order(&mut tx, hold.id).await {
            Ok(order) => order,
            Err(e) if is_unique_violation(&e) => {
                return Err(AppError::BadRequest("Hold has already been used".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        queries::mark_hold_used(&mut tx, hold.id).await?;
        tx.commit().await?;

        self.cache.invalidate(hold.product_id).await;
        Ok(order)
    }

    /// Transition an order to paid within the caller's transaction. The
    /// caller owns cache invalidation after commit.
    pub async fn mark_paid(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        order_id: i64,
    ) -> Result<Order, AppError> {
        queries::update_order_status(tx, order_id, OrderStatus::Paid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }

    /// Transition an order to cancelled within the caller's transaction.
    pub async fn cancel(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        order_id: i64,
    ) -> Result<Order, AppError> {
        queries::update_order_status(tx, order_id, OrderStatus::Cancelled)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))
    }
}
