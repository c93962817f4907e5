//! Error handling for the item correction service
//!
//! Every correction step reports failure through `AppError`; handlers turn it
//! into a JSON error response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{RebalanceError, RecordError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authorization errors
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("Cannot rebalance: {0}")]
    Rebalance(#[from] RebalanceError),

    #[error("Voucher {voucher_no} out of balance after correction (before {before}, after {after})")]
    LedgerImbalance {
        voucher_no: String,
        before: Decimal,
        after: Decimal,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        match errors.field_errors().into_iter().next() {
            Some((field, list)) => AppError::Validation {
                field: field.to_string(),
                message: list
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field)),
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl AppError {
    /// HTTP status and response body for this error
    pub fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::InvalidRecord(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_RECORD", err.to_string()),
            ),
            AppError::Rebalance(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("REBALANCE_REFUSED", err.to_string()),
            ),
            AppError::LedgerImbalance { .. } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("LEDGER_IMBALANCE", self.to_string()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn rebalance_refusal_is_unprocessable() {
        let err = AppError::from(RebalanceError::MissingAssetLeg {
            voucher_no: "PINV-0001".into(),
            account: "Asset Received But Not Billed - AOGC".into(),
        });
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "REBALANCE_REFUSED");
        assert!(detail.message.contains("PINV-0001"));
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.message, "A database error occurred");
    }

    #[test]
    fn validation_errors_name_the_field() {
        let input = shared::AssetAccountInput {
            asset_category: String::new(),
            asset_account: "Fixed Assets - AOGC".into(),
        };
        let err = AppError::from(input.validate().unwrap_err());
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "asset_category");
                assert_eq!(message, "asset category is required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn imbalance_message_reports_both_sides() {
        let err = AppError::LedgerImbalance {
            voucher_no: "PR-0001".into(),
            before: Decimal::ZERO,
            after: Decimal::from(5),
        };
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(detail.message.contains("after 5"));
    }
}
