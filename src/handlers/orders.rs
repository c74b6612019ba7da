use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::models::OrderStatus;
use crate::error::AppError;
use crate::validation::{require_json, FieldErrors};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub hold_id: Option<i64>,
}

impl CreateOrderRequest {
    fn validate(self) -> Result<i64, AppError> {
        let mut errors = FieldErrors::new();
        let hold_id = self.hold_id.unwrap_or_else(|| {
            errors.add("hold_id", "is required");
            0
        });
        errors.into_result()?;
        Ok(hold_id)
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResource {
    pub order_id: i64,
    pub hold_id: i64,
    pub status: OrderStatus,
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let hold_id = require_json(payload)?.validate()?;

    let order = state.orders.create_from_hold(hold_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResource {
            order_id: order.id,
            hold_id: order.hold_id,
            status: order.status,
        }),
    ))
}
