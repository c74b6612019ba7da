use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::StockCache;
use crate::db::models::{OrderStatus, PaymentStatus};
use crate::db::queries;
use crate::error::{is_unique_violation, AppError};
use crate::metrics::Metrics;
use crate::retry::retry_on_contention;
use crate::services::orders::OrderService;

/// Reconciliation result reported back to the payment provider. Replays of
/// the same idempotency key produce byte-identical bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookOutcome {
    pub order_id: i64,
    pub status: OrderStatus,
}

struct AttemptOutcome {
    response: WebhookOutcome,
    invalidate_product: Option<i64>,
}

#[derive(Clone)]
pub struct WebhookService {
    pool: PgPool,
    cache: StockCache,
    metrics: Arc<Metrics>,
    orders: OrderService,
}

impl WebhookService {
    pub fn new(
        pool: PgPool,
        cache: StockCache,
        metrics: Arc<Metrics>,
        orders: OrderService,
    ) -> Self {
        Self {
            pool,
            cache,
            metrics,
            orders,
        }
    }

    /// Idempotent status reconciliation.
    ///
    /// The idempotency contract is keyed purely on `idempotency_key`: a
    /// replay returns the state of the order the key was first recorded
    /// against, regardless of the order_id it now carries.
    pub async fn process(
        &self,
        order_id: i64,
        idempotency_key: &str,
        raw_status: &str,
    ) -> Result<WebhookOutcome, AppError> {
        let started = Instant::now();

        // Fast path: a payment with this key already exists, no transaction
        // needed.
        if let Some(payment) = queries::get_payment_by_key(&self.pool, idempotency_key).await? {
            let outcome = self.replay(payment.order_id).await?;
            self.metrics.record_webhook_processing(started.elapsed());
            return Ok(outcome);
        }

        let status = PaymentStatus::from_str(raw_status)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid status '{raw_status}'")))?;

        let outcome = retry_on_contention(&self.metrics, "webhooks.process", || {
            self.process_attempt(order_id, idempotency_key, status)
        })
        .await?;

        if let Some(product_id) = outcome.invalidate_product {
            self.cache.invalidate(product_id).await;
        }
        self.metrics.record_webhook_processing(started.elapsed());

        tracing::info!(
            order_id = outcome.response.order_id,
            status = %outcome.response.status,
            "webhook processed"
        );
        Ok(outcome.response)
    }

    /// Duplicate delivery: answer with the original order's current state.
    async fn replay(&self, recorded_order_id: i64) -> Result<WebhookOutcome, AppError> {
        let order = queries::get_order(&self.pool, recorded_order_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Order {recorded_order_id} not found"))
            })?;

        self.metrics.record_webhook_duplicate();
        tracing::info!(
            order_id = order.id,
            status = %order.status,
            "duplicate webhook replayed"
        );
        Ok(WebhookOutcome {
            order_id: order.id,
            status: order.status,
        })
    }

    async fn process_attempt(
        &self,
        order_id: i64,
        idempotency_key: &str,
        status: PaymentStatus,
    ) -> Result<AttemptOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let order = queries::get_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

        // Re-probe inside the transaction: another delivery may have won the
        // race since the fast-path check.
        if let Some(existing) = queries::get_payment_by_key(&mut *tx, idempotency_key).await? {
            tx.rollback().await?;
            return Ok(AttemptOutcome {
                response: self.replay(existing.order_id).await?,
                invalidate_product: None,
            });
        }

        match queries::insert_payment(&mut tx, order.id, idempotency_key, status).await {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                // A concurrent delivery inserted the key between the re-probe
                // and our insert. The violation aborts this transaction, so
                // answer from the committed row.
                tx.rollback().await?;
                return match queries::get_payment_by_key(&self.pool, idempotency_key).await? {
                    Some(existing) => Ok(AttemptOutcome {
                        response: self.replay(existing.order_id).await?,
                        invalidate_product: None,
                    }),
                    // The racing transaction rolled back after aborting ours;
                    // surface as contention so the wrapper re-runs.
                    None => Err(AppError::Contention),
                };
            }
            Err(e) => return Err(e.into()),
        }

        let (updated, invalidate_product) = match status {
            PaymentStatus::Success => {
                let updated = self.orders.mark_paid(&mut tx, order.id).await?;
                let product_id = queries::product_id_for_order(&mut *tx, order.id).await?;
                (updated, product_id)
            }
            PaymentStatus::Failed => {
                let updated = self.orders.cancel(&mut tx, order.id).await?;
                // Failed payment: the hold's quantity goes back to the pool.
                let product_id = queries::release_hold(&mut *tx, updated.hold_id).await?;
                (updated, product_id)
            }
        };

        tx.commit().await?;

        Ok(AttemptOutcome {
            response: WebhookOutcome {
                order_id: updated.id,
                status: updated.status,
            },
            invalidate_product,
        })
    }
}
