use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;

use crate::db::queries;
use crate::error::AppError;
use crate::services::availability;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProductResource {
    pub id: i64,
    pub name: String,
    pub price: BigDecimal,
    pub total_stock: i64,
    pub available_stock: i64,
}

/// Availability comes from the snapshot cache when fresh; otherwise the
/// authoritative view is read and a new snapshot stored.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let product = queries::get_product(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

    let available_stock = match state.cache.get_available(id).await {
        Some(cached) => cached,
        None => {
            let computed = availability::available_stock(&state.db, id, Utc::now())
                .await?
                .unwrap_or(0);
            state.cache.put_available(id, computed).await;
            computed
        }
    };

    Ok(Json(ProductResource {
        id: product.id,
        name: product.name,
        price: product.price,
        total_stock: product.stock,
        available_stock,
    }))
}
