use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::validation::{require_json, FieldErrors};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub order_id: Option<i64>,
    pub idempotency_key: Option<String>,
    pub status: Option<String>,
}

impl WebhookRequest {
    /// Schema-level checks only. The status *value* is the processor's
    /// concern (a 400), not a validation failure.
    fn validate(self) -> Result<(i64, String, String), AppError> {
        let mut errors = FieldErrors::new();

        let order_id = self.order_id.unwrap_or_else(|| {
            errors.add("order_id", "is required");
            0
        });
        let idempotency_key = match self.idempotency_key {
            Some(key) if !key.is_empty() => key,
            Some(_) => {
                errors.add("idempotency_key", "must not be empty");
                String::new()
            }
            None => {
                errors.add("idempotency_key", "is required");
                String::new()
            }
        };
        let status = self.status.unwrap_or_else(|| {
            errors.add("status", "is required");
            String::new()
        });

        errors.into_result()?;
        Ok((order_id, idempotency_key, status))
    }
}

pub async fn process(
    State(state): State<AppState>,
    payload: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (order_id, idempotency_key, status) = require_json(payload)?.validate()?;

    let outcome = state
        .webhooks
        .process(order_id, &idempotency_key, &status)
        .await?;

    Ok(Json(outcome))
}
