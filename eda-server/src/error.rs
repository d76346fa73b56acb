//! Error types for eda-server
//!
//! Client errors carry the offending names so the caller can fix the
//! request. Internal failures are logged in full and surfaced opaquely.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use polars::prelude::PolarsError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Service error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Session id is unknown (404)
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    /// One or more referenced columns are absent from the current table (400)
    #[error("Columns not found: {}", .0.join(", "))]
    InvalidColumn(Vec<String>),

    /// Method name outside the accepted enumeration (400)
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Action name outside the accepted enumeration (400)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Row indices outside the current table (400)
    #[error("Row indices out of range: {}", join_indices(.0))]
    InvalidIndex(Vec<usize>),

    /// Operation needs a different column type (400)
    #[error("Column '{column}' {detail}")]
    TypeMismatch { column: String, detail: String },

    /// Conditionally required parameter was omitted (400)
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Mode requested on a column with no non-missing values (400)
    #[error("Column '{0}' has no mode value")]
    NoModeValue(String),

    /// Aggregate requested on a column with no non-missing values (400)
    #[error("Column '{0}' has no non-missing values")]
    EmptyColumn(String),

    /// Upload could not be turned into a table (400)
    #[error("File processing error: {0}")]
    InvalidUpload(String),

    /// Session lock not acquired within the configured timeout (503)
    #[error("Session {0} is busy, retry later")]
    Busy(Uuid),

    /// Tabular engine failure
    #[error("Table engine error: {0}")]
    Engine(#[from] PolarsError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ApiError {
    /// Build a type mismatch error for a column that must be numeric
    pub fn not_numeric(column: &str, operation: &str) -> Self {
        ApiError::TypeMismatch {
            column: column.to_string(),
            detail: format!("must be numeric for {}", operation),
        }
    }

    /// Stable machine-readable code and HTTP status
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::InvalidColumn(_) => (StatusCode::BAD_REQUEST, "INVALID_COLUMN"),
            ApiError::InvalidMethod(_) => (StatusCode::BAD_REQUEST, "INVALID_METHOD"),
            ApiError::InvalidAction(_) => (StatusCode::BAD_REQUEST, "INVALID_ACTION"),
            ApiError::InvalidIndex(_) => (StatusCode::BAD_REQUEST, "INVALID_INDEX"),
            ApiError::TypeMismatch { .. } => (StatusCode::BAD_REQUEST, "TYPE_MISMATCH"),
            ApiError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "MISSING_PARAMETER"),
            ApiError::NoModeValue(_) => (StatusCode::BAD_REQUEST, "NO_MODE_VALUE"),
            ApiError::EmptyColumn(_) => (StatusCode::BAD_REQUEST, "EMPTY_COLUMN"),
            ApiError::InvalidUpload(_) => (StatusCode::BAD_REQUEST, "INVALID_UPLOAD"),
            ApiError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "SESSION_BUSY"),
            ApiError::Engine(_) | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// True for failures the caller cannot fix by changing the request
    pub fn is_internal(&self) -> bool {
        self.status_and_code().0 == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = if self.is_internal() {
            tracing::error!(error = %self, "Request failed with internal error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for service operations
pub type ApiResult<T> = Result<T, ApiError>;
