//! Error handling module for the ArkABA backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const EVENT_FULL: &str = "EVENT_FULL";
    pub const INVALID_STATE: &str = "INVALID_STATE";
    pub const PAYMENT_REQUIRED: &str = "PAYMENT_REQUIRED";
    pub const PAYMENTS_UNAVAILABLE: &str = "PAYMENTS_UNAVAILABLE";
    pub const PAYMENT_ERROR: &str = "PAYMENT_ERROR";
    pub const MAIL_ERROR: &str = "MAIL_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const SEARCH_ERROR: &str = "SEARCH_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required
    #[error("{0}")]
    Unauthorized(String),
    /// Resource not found
    #[error("{0}")]
    NotFound(String),
    /// Validation error
    #[error("{0}")]
    Validation(String),
    /// Optimistic concurrency conflict
    #[error("{message}")]
    Conflict {
        message: String,
        current_version: i64,
    },
    /// Unique constraint on a natural key (email, slug, registration)
    #[error("{0}")]
    AlreadyExists(String),
    /// Event has no seats left
    #[error("{0}")]
    CapacityExceeded(String),
    /// Operation not allowed in the resource's current state
    #[error("{0}")]
    InvalidState(String),
    /// Payment has not completed yet
    #[error("{0}")]
    PaymentRequired(String),
    /// No payment gateway configured
    #[error("{0}")]
    PaymentsUnavailable(String),
    /// Payment gateway rejected or failed the call
    #[error("{0}")]
    Payment(String),
    /// Mail delivery failed
    #[error("{0}")]
    Mail(String),
    /// Database error
    #[error("{0}")]
    Database(String),
    /// Search index error
    #[error("{0}")]
    Search(String),
    /// Internal server error
    #[error("{0}")]
    Internal(String),
    /// Bad request
    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. }
            | AppError::AlreadyExists(_)
            | AppError::CapacityExceeded(_)
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::PaymentsUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Payment(_) | AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Search(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::AlreadyExists(_) => codes::CONFLICT,
            AppError::CapacityExceeded(_) => codes::EVENT_FULL,
            AppError::InvalidState(_) => codes::INVALID_STATE,
            AppError::PaymentRequired(_) => codes::PAYMENT_REQUIRED,
            AppError::PaymentsUnavailable(_) => codes::PAYMENTS_UNAVAILABLE,
            AppError::Payment(_) => codes::PAYMENT_ERROR,
            AppError::Mail(_) => codes::MAIL_ERROR,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Search(_) => codes::SEARCH_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Build the usual optimistic-concurrency mismatch error.
    pub fn version_mismatch(expected: i64, current: i64) -> Self {
        AppError::Conflict {
            message: format!("Version mismatch: expected {}, current {}", expected, current),
            current_version: current,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<tantivy::TantivyError> for AppError {
    fn from(err: tantivy::TantivyError) -> Self {
        tracing::error!("Search error: {:?}", err);
        AppError::Search(format!("Search error: {}", err))
    }
}

impl From<tantivy::query::QueryParserError> for AppError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        AppError::BadRequest(format!("Invalid search query: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Upstream HTTP error: {:?}", err);
        AppError::Payment(format!("Upstream request failed: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        let details = match error {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "currentVersion": current_version })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.to_string(),
                details,
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.error.error_code(), "{}", self.error);
        }
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}
