use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// A single field-level validation failure, accumulated by the request
/// validators and rendered under the 422 `errors` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Service temporarily unavailable due to database contention")]
    Contention,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Contention => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is safe to retry under the contention policy.
    pub fn is_contention(&self) -> bool {
        match self {
            AppError::Contention => true,
            AppError::Database(e) => is_contention_error(e),
            _ => false,
        }
    }
}

/// Classify deadlock/serialization failures that are safe to re-run.
///
/// Covers SQLSTATE 40001 (serialization_failure), 40P01 (deadlock_detected),
/// MySQL error 1213, and driver messages that only carry the failure in text.
pub fn is_contention_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            if let Some(code) = db.code() {
                if code == "40001" || code == "40P01" || code == "1213" {
                    return true;
                }
            }
            let message = db.message().to_lowercase();
            message.contains("deadlock") || message.contains("try restarting transaction")
        }
        _ => false,
    }
}

/// The unique-constraint safeguards (payments.idempotency_key, orders.hold_id)
/// surface through here rather than as 500s.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::Validation(field_errors) = &self {
            let mut errors = serde_json::Map::new();
            for fe in field_errors {
                if let Some(msgs) = errors
                    .entry(fe.field.to_string())
                    .or_insert_with(|| json!([]))
                    .as_array_mut()
                {
                    msgs.push(json!(fe.message));
                }
            }
            let body = Json(json!({
                "message": "Validation failed",
                "errors": errors,
            }));
            return (status, body).into_response();
        }

        if let AppError::Database(e) = &self {
            tracing::error!(error = %e, "request failed on database error");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status_code() {
        let error = AppError::NotFound("Product 1 not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_request_status_code() {
        let error = AppError::BadRequest("Insufficient stock available".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_status_code() {
        let error = AppError::Validation(vec![FieldError::new("qty", "must be at least 1")]);
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_contention_status_code() {
        assert_eq!(
            AppError::Contention.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_contention_variant_is_retryable() {
        assert!(AppError::Contention.is_contention());
        assert!(!AppError::NotFound("x".to_string()).is_contention());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_contention());
    }

    #[tokio::test]
    async fn test_validation_error_body_shape() {
        use http_body_util::BodyExt;

        let error = AppError::Validation(vec![
            FieldError::new("qty", "is required"),
            FieldError::new("qty", "must be at least 1"),
            FieldError::new("product_id", "is required"),
        ]);
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"]["qty"].as_array().unwrap().len(), 2);
        assert_eq!(body["errors"]["product_id"][0], "is required");
    }

    #[tokio::test]
    async fn test_contention_error_response() {
        let response = AppError::Contention.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
