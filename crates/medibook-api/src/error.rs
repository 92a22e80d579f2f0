//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use medibook_chat::ChatError;
use medibook_core::error::MedibookError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// 404 Not Found - unknown user.
    #[error("{0}")]
    NotFound(String),
    /// 409 Conflict - user already registered.
    #[error("{0}")]
    Conflict(String),
    /// 500 Internal Server Error - persistence failure.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<MedibookError> for ApiError {
    fn from(err: MedibookError) -> Self {
        match err {
            MedibookError::UserNotFound(id) => ApiError::NotFound(format!("User not found: {}", id)),
            MedibookError::UserExists(id) => {
                ApiError::Conflict(format!("User already exists: {}", id))
            }
            MedibookError::SlotTaken(slot) => {
                ApiError::Conflict(format!("Slot already taken: {}", slot))
            }
            MedibookError::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::UserNotFound(id) => ApiError::NotFound(format!("User not found: {}", id)),
            ChatError::InvalidTransition { .. } | ChatError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
