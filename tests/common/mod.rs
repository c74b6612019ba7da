#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;

use flashsale_core::cache::MemoryCache;
use flashsale_core::metrics::Metrics;
use flashsale_core::AppState;

pub async fn setup_test_db() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let migrator = Migrator::new(Path::new("./migrations"))
        .await
        .expect("Failed to load migrations");
    migrator
        .run(&pool)
        .await
        .expect("Failed to run migrations on test DB");
    pool
}

pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(
        pool,
        Arc::new(MemoryCache::new()),
        Arc::new(Metrics::default()),
    )
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn read_body(response: Response) -> (StatusCode, Vec<u8>) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();
    (status, bytes.to_vec())
}

pub async fn read_json(response: Response) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = read_body(response).await;
    let value = serde_json::from_slice(&bytes).expect("Response body was not JSON");
    (status, value)
}
