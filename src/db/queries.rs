use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Result, Transaction as SqlxTransaction};

use crate::db::models::{Hold, Order, OrderStatus, Payment, PaymentStatus, Product};

// --- Product queries ---

pub async fn get_product(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Takes an exclusive row lock on the product for the rest of the transaction.
/// Every availability check for this product serializes behind it.
pub async fn get_product_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: i64,
) -> Result<Option<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

/// Sum of quantities held by active (unused, unexpired) holds.
pub async fn active_hold_sum(
    executor: impl PgExecutor<'_>,
    product_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(quantity), 0)::BIGINT
        FROM holds
        WHERE product_id = $1 AND is_used = FALSE AND expires_at > $2
        "#,
    )
    .bind(product_id)
    .bind(now)
    .fetch_one(executor)
    .await
}

// --- Hold queries ---

pub async fn get_hold(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Hold>> {
    sqlx::query_as::<_, Hold>("SELECT * FROM holds WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn get_hold_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: i64,
) -> Result<Option<Hold>> {
    sqlx::query_as::<_, Hold>("SELECT * FROM holds WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn insert_hold(
    executor: &mut SqlxTransaction<'_, Postgres>,
    product_id: i64,
    quantity: i64,
    expires_at: DateTime<Utc>,
) -> Result<Hold> {
    sqlx::query_as::<_, Hold>(
        r#"
        INSERT INTO holds (product_id, quantity, expires_at, is_used)
        VALUES ($1, $2, $3, FALSE)
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .bind(expires_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn mark_hold_used(
    executor: &mut SqlxTransaction<'_, Postgres>,
    hold_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE holds SET is_used = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(hold_id)
        .execute(&mut **executor)
        .await?;
    Ok(())
}

/// Return the hold's quantity to the available pool. Yields the product id
/// for cache invalidation, or `None` when the hold does not exist.
pub async fn release_hold(executor: impl PgExecutor<'_>, hold_id: i64) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE holds SET is_used = FALSE, updated_at = NOW()
        WHERE id = $1
        RETURNING product_id
        "#,
    )
    .bind(hold_id)
    .fetch_optional(executor)
    .await
}

/// Idempotent sweep: consume every past-due hold that is still unused.
/// Returns (hold_id, product_id) for each row actually transitioned.
pub async fn expire_due_holds(
    executor: impl PgExecutor<'_>,
    now: DateTime<Utc>,
) -> Result<Vec<(i64, i64)>> {
    sqlx::query_as::<_, (i64, i64)>(
        r#"
        UPDATE holds SET is_used = TRUE, updated_at = NOW()
        WHERE expires_at <= $1 AND is_used = FALSE
        RETURNING id, product_id
        "#,
    )
    .bind(now)
    .fetch_all(executor)
    .await
}

// --- Order queries ---

pub async fn get_order(executor: impl PgExecutor<'_>, id: i64) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn insert_order(
    executor: &mut SqlxTransaction<'_, Postgres>,
    hold_id: i64,
) -> Result<Order> {
    sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (hold_id, status)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(hold_id)
    .bind(OrderStatus::Pending)
    .fetch_one(&mut **executor)
    .await
}

pub async fn update_order_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: i64,
    status: OrderStatus,
) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_optional(&mut **executor)
    .await
}

/// Product backing an order, via its hold. Used for cache invalidation.
pub async fn product_id_for_order(
    executor: impl PgExecutor<'_>,
    order_id: i64,
) -> Result<Option<i64>> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT h.product_id
        FROM orders o
        JOIN holds h ON h.id = o.hold_id
        WHERE o.id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(executor)
    .await
}

// --- Payment queries ---

pub async fn get_payment_by_key(
    executor: impl PgExecutor<'_>,
    idempotency_key: &str,
) -> Result<Option<Payment>> {
    sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE idempotency_key = $1")
        .bind(idempotency_key)
        .fetch_optional(executor)
        .await
}

/// The UNIQUE constraint on idempotency_key is the hard idempotency
/// safeguard; callers map the violation to the duplicate path.
pub async fn insert_payment(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: i64,
    idempotency_key: &str,
    status: PaymentStatus,
) -> Result<Payment> {
    sqlx::query_as::<_, Payment>(
        r#"
        INSERT INTO payments (order_id, idempotency_key, status)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(idempotency_key)
    .bind(status)
    .fetch_one(&mut **executor)
    .await
}

// --- Administrative ---

/// Products are provisioned administratively; no request path creates them.
pub async fn insert_product(
    pool: &PgPool,
    name: &str,
    price: bigdecimal::BigDecimal,
    stock: i64,
) -> Result<Product> {
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, price, stock)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
}
