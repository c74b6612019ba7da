use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::validation::{require_json, FieldErrors};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub product_id: Option<i64>,
    pub qty: Option<i64>,
}

impl CreateHoldRequest {
    fn validate(self) -> Result<(i64, i64), AppError> {
        let mut errors = FieldErrors::new();

        let product_id = self.product_id.unwrap_or_else(|| {
            errors.add("product_id", "is required");
            0
        });
        let qty = match self.qty {
            Some(qty) if qty >= 1 => qty,
            Some(_) => {
                errors.add("qty", "must be at least 1");
                0
            }
            None => {
                errors.add("qty", "is required");
                0
            }
        };

        errors.into_result()?;
        Ok((product_id, qty))
    }
}

#[derive(Debug, Serialize)]
pub struct HoldResource {
    pub hold_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateHoldRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let (product_id, qty) = require_json(payload)?.validate()?;

    let hold = state.holds.create_with_validation(product_id, qty).await?;

    Ok((
        StatusCode::CREATED,
        Json(HoldResource {
            hold_id: hold.id,
            product_id: hold.product_id,
            quantity: hold.quantity,
            expires_at: hold.expires_at,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_minimal_request() {
        let req = CreateHoldRequest {
            product_id: Some(1),
            qty: Some(1),
        };
        assert_eq!(req.validate().unwrap(), (1, 1));
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let req = CreateHoldRequest {
            product_id: None,
            qty: None,
        };
        match req.validate() {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_non_positive_qty() {
        let req = CreateHoldRequest {
            product_id: Some(1),
            qty: Some(0),
        };
        match req.validate() {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields[0].field, "qty");
                assert_eq!(fields[0].message, "must be at least 1");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
