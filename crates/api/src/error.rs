//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reviewloop_billing::BillingError;
use serde_json::json;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Request errors
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Resource not found")]
    NotFound,

    // Billing core errors (provider, reconciliation, storage)
    #[error(transparent)]
    Billing(#[from] BillingError),

    // Identity provider (account deletion)
    #[error("Identity provider error: {0}")]
    Identity(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                self.to_string(),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            // Every upstream failure surfaces as 500 with the provider's
            // message passed through; a business rejection from the approval
            // handler takes the same path, distinguished only by its code.
            ApiError::Billing(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.code(), err.to_string())
            }
            ApiError::Identity(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IDENTITY_ERROR",
                msg.clone(),
            ),
            ApiError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Database error");
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            _ => ApiError::Database(err.to_string()),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Reject requests with absent or empty required fields before any outbound
/// call is made.
pub fn require_fields(fields: &[(&str, &str)]) -> ApiResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )))
    }
}
