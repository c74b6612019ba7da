use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};

use crate::db::models::Product;
use crate::db::queries;

/// Available stock for a product: `stock` minus the sum of active-hold
/// quantities, clamped at zero. `None` when the product does not exist.
///
/// This is the authoritative read; it never consults the cache.
pub async fn available_stock(
    pool: &PgPool,
    product_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;

    let Some(stock) = stock else {
        return Ok(None);
    };

    let held = queries::active_hold_sum(pool, product_id, now).await?;
    Ok(Some((stock - held).max(0)))
}

/// Same computation under the caller's transaction, for use while the
/// product row lock is held.
pub async fn available_stock_in_tx(
    tx: &mut SqlxTransaction<'_, Postgres>,
    product: &Product,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let held = queries::active_hold_sum(&mut **tx, product.id, now).await?;
    Ok((product.stock - held).max(0))
}
