//! Error types for core314-ingest

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Signature or token rejection (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400); carries an itemized error list
    #[error("Invalid request")]
    Validation(Vec<String>),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// core314-common error
    #[error("Common error: {0}")]
    Common(#[from] core314_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Validation(errors) = self {
            let body = Json(json!({
                "error": {
                    "code": "VALIDATION_FAILED",
                    "message": "Request validation failed",
                    "errors": errors,
                }
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Validation(_) => unreachable!("handled above"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(ref err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
            }
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

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
