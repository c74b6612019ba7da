//! Webhook reconciliation scenarios: idempotent replay, hold release on
//! failure, out-of-order delivery, and the expiry sweep. Ignored unless
//! DATABASE_URL points at a live Postgres.

mod common;

use axum::http::StatusCode;
use bigdecimal::BigDecimal;
use serde_json::json;
use tower::ServiceExt;

use flashsale_core::db::models::OrderStatus;
use flashsale_core::db::queries;
use flashsale_core::{create_app, AppState};

/// Product → hold → pending order, returning (product_id, hold_id, order_id).
async fn seed_order(state: &AppState, stock: i64, qty: i64) -> (i64, i64, i64) {
    let product = queries::insert_product(&state.db, "Flash item", BigDecimal::from(25), stock)
        .await
        .unwrap();
    let hold = state
        .holds
        .create_with_validation(product.id, qty)
        .await
        .unwrap();
    let order = state.orders.create_from_hold(hold.id).await.unwrap();
    (product.id, hold.id, order.id)
}

async fn payment_count(pool: &sqlx::PgPool, key: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE idempotency_key = $1")
        .bind(key)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_success_webhook_is_idempotent() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());
    let app = create_app(state.clone());

    let (_product_id, hold_id, order_id) = seed_order(&state, 100, 5).await;
    let key = format!("evt-success-{order_id}");

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(common::post_json(
                "/api/payments/webhook",
                json!({"order_id": order_id, "idempotency_key": key, "status": "success"}),
            ))
            .await
            .unwrap();
        let (status, body) = common::read_body(response).await;
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
    let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(parsed["order_id"], order_id);
    assert_eq!(parsed["status"], "paid");

    assert_eq!(payment_count(&pool, &key).await, 1);

    let order = queries::get_order(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    let hold = queries::get_hold(&pool, hold_id).await.unwrap().unwrap();
    assert!(hold.is_used, "a paid hold stays consumed");

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.webhook_duplicates, 2, "two of three deliveries were replays");
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_failed_webhook_cancels_and_releases_hold() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());
    let app = create_app(state.clone());

    let (product_id, hold_id, order_id) = seed_order(&state, 100, 5).await;
    let key = format!("evt-failed-{order_id}");

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(common::post_json(
                "/api/payments/webhook",
                json!({"order_id": order_id, "idempotency_key": key, "status": "failed"}),
            ))
            .await
            .unwrap();
        let (status, body) = common::read_body(response).await;
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
    let parsed: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(parsed["status"], "cancelled");

    assert_eq!(payment_count(&pool, &key).await, 1);

    let order = queries::get_order(&pool, order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    let hold = queries::get_hold(&pool, hold_id).await.unwrap().unwrap();
    assert!(!hold.is_used, "a failed payment returns the hold to the pool");

    // The released quantity is available again.
    let available =
        flashsale_core::services::availability::available_stock(&pool, product_id, chrono::Utc::now())
            .await
            .unwrap()
            .unwrap();
    assert_eq!(available, 95);
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_out_of_order_webhook_then_catch_up() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());
    let app = create_app(state.clone());

    let key = format!("evt-early-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap());

    // Delivery arrives before the order exists.
    let response = app
        .clone()
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": 9_999_999_999i64, "idempotency_key": key, "status": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(payment_count(&pool, &key).await, 0);

    // Provider retries once the order is real.
    let (_product_id, _hold_id, order_id) = seed_order(&state, 50, 1).await;
    let retry = app
        .clone()
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": order_id, "idempotency_key": key, "status": "success"}),
        ))
        .await
        .unwrap();
    let (status, first_body) = common::read_body(retry).await;
    assert_eq!(status, StatusCode::OK);

    let replay = app
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": order_id, "idempotency_key": key, "status": "success"}),
        ))
        .await
        .unwrap();
    let (status, second_body) = common::read_body(replay).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first_body, second_body);
    assert_eq!(payment_count(&pool, &key).await, 1);
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_replayed_key_answers_for_original_order() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());
    let app = create_app(state.clone());

    let (_p1, _h1, first_order) = seed_order(&state, 20, 1).await;
    let (_p2, _h2, second_order) = seed_order(&state, 20, 1).await;
    let key = format!("evt-shared-{first_order}");

    let response = app
        .clone()
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": first_order, "idempotency_key": key, "status": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same key, different order: the key is the source of truth.
    let replay = app
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": second_order, "idempotency_key": key, "status": "failed"}),
        ))
        .await
        .unwrap();
    let (status, body) = common::read_json(replay).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], first_order);
    assert_eq!(body["status"], "paid");

    let untouched = queries::get_order(&pool, second_order).await.unwrap().unwrap();
    assert_eq!(untouched.status, OrderStatus::Pending);
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_unknown_status_value_is_400() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());
    let app = create_app(state.clone());

    let (_product_id, _hold_id, order_id) = seed_order(&state, 10, 1).await;
    let key = format!("evt-badstatus-{order_id}");

    let response = app
        .oneshot(common::post_json(
            "/api/payments/webhook",
            json!({"order_id": order_id, "idempotency_key": key, "status": "refunded"}),
        ))
        .await
        .unwrap();

    let (status, body) = common::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid status 'refunded'");
    assert_eq!(payment_count(&pool, &key).await, 0);
}

#[tokio::test]
#[ignore = "requires a Postgres instance (DATABASE_URL)"]
async fn test_expiry_sweep_is_idempotent() {
    let pool = common::setup_test_db().await;
    let state = common::test_state(pool.clone());

    let product = queries::insert_product(&pool, "Sweep target", BigDecimal::from(15), 10)
        .await
        .unwrap();
    let first = state.holds.create_with_validation(product.id, 2).await.unwrap();
    let second = state.holds.create_with_validation(product.id, 3).await.unwrap();

    sqlx::query("UPDATE holds SET expires_at = NOW() - INTERVAL '1 second' WHERE id = ANY($1)")
        .bind(vec![first.id, second.id])
        .execute(&pool)
        .await
        .unwrap();

    let (_count, product_ids) = state.holds.process_expired().await.unwrap();
    assert!(product_ids.contains(&product.id));
    for hold_id in [first.id, second.id] {
        let hold = queries::get_hold(&pool, hold_id).await.unwrap().unwrap();
        assert!(hold.is_used);
    }

    // Second sweep finds nothing left for this product.
    let (_count, product_ids) = state.holds.process_expired().await.unwrap();
    assert!(!product_ids.contains(&product.id));

    let available =
        flashsale_core::services::availability::available_stock(&pool, product.id, chrono::Utc::now())
            .await
            .unwrap()
            .unwrap();
    assert_eq!(available, 10);
}
