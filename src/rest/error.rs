//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CheckoutError, PersistenceError};
use crate::render::RenderError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found
    NotFound(String),
    /// Bad request
    BadRequest(String),
    /// Action not allowed in the section's current state
    Conflict(String),
    /// Session write failed after retries; the client may try again
    SessionUnavailable(String),
    /// Order commit aborted; the order must not complete
    CommitAborted(String),
    /// Order commit exceeded its hard timeout
    CommitTimedOut(String),
    /// Internal server error
    InternalError(String),
}

/// Error response body
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::SessionUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "session_unavailable", msg)
            }
            ApiError::CommitAborted(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "commit_aborted", msg)
            }
            ApiError::CommitTimedOut(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "commit_timed_out", msg)
            }
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            // Handlers surface field errors inline; this is the fallback
            CheckoutError::Validation { .. } => ApiError::BadRequest(err.to_string()),
            CheckoutError::SessionUnavailable { .. } => ApiError::SessionUnavailable(err.to_string()),
            CheckoutError::CommitAborted { .. } => ApiError::CommitAborted(err.to_string()),
            CheckoutError::CommitTimedOut { .. } => ApiError::CommitTimedOut(err.to_string()),
            CheckoutError::SectionNotOpen(_) => ApiError::NotFound(err.to_string()),
            CheckoutError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            CheckoutError::Persistence(source) => source.into(),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        if err.is_retryable() {
            ApiError::SessionUnavailable(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("JSON error: {}", err))
    }
}
