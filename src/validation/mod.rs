use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{AppError, FieldError};

/// Unwrap a JSON body extraction, mapping malformed or mistyped payloads to
/// the 422 validation shape under a `body` key.
pub fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::Validation(vec![FieldError::new(
            "body",
            rejection.body_text(),
        )])),
    }
}

/// Accumulator for field-level checks; a request fails with every problem
/// reported at once, not just the first.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator_passes() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_accumulates_all_problems() {
        let mut errors = FieldErrors::new();
        errors.add("product_id", "is required");
        errors.add("qty", "is required");
        assert!(!errors.is_empty());

        match errors.into_result() {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "product_id");
                assert_eq!(fields[1].field, "qty");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
