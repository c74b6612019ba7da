pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod retry;
pub mod services;
pub mod validation;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::cache::{Cache, StockCache};
use crate::metrics::Metrics;
use crate::services::{HoldService, OrderService, WebhookService};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: StockCache,
    pub metrics: Arc<Metrics>,
    pub holds: HoldService,
    pub orders: OrderService,
    pub webhooks: WebhookService,
}

impl AppState {
    pub fn new(db: PgPool, cache: Arc<dyn Cache>, metrics: Arc<Metrics>) -> Self {
        let cache = StockCache::new(cache, Arc::clone(&metrics));
        let holds = HoldService::new(db.clone(), cache.clone(), Arc::clone(&metrics));
        let orders = OrderService::new(db.clone(), cache.clone(), Arc::clone(&metrics));
        let webhooks = WebhookService::new(
            db.clone(),
            cache.clone(),
            Arc::clone(&metrics),
            orders.clone(),
        );
        Self {
            db,
            cache,
            metrics,
            holds,
            orders,
            webhooks,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/products/:id", get(handlers::products::show))
        .route("/api/holds", post(handlers::holds::create))
        .route("/api/orders", post(handlers::orders::create))
        .route("/api/payments/webhook", post(handlers::webhook::process))
        .with_state(state)
}
