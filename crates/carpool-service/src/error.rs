//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use carpool_core::{ErrorKind, IdError, LifecycleError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request - malformed input rejected before reaching the engine.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A lifecycle operation failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// HTTP status for an error class.
#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Retryable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn details(err: &LifecycleError) -> Option<serde_json::Value> {
    match err {
        LifecycleError::InsufficientInventory {
            available,
            requested,
        } => Some(serde_json::json!({
            "available": available,
            "requested": requested
        })),
        LifecycleError::InvalidSeatCount { seats, min, max } => Some(serde_json::json!({
            "seats": seats,
            "min": min,
            "max": max
        })),
        LifecycleError::ActiveBookingsExist { count, .. } => Some(serde_json::json!({
            "confirmed_bookings": count
        })),
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Lifecycle(err) => match err.kind() {
                ErrorKind::Internal => {
                    tracing::error!(error = %err, code = err.code(), "Internal server error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        err.code(),
                        "An internal error occurred".to_string(),
                        None,
                    )
                }
                ErrorKind::Retryable if matches!(err, LifecycleError::StorageUnavailable(_)) => {
                    tracing::warn!(error = %err, "Storage temporarily unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        err.code(),
                        "Storage temporarily unavailable, retry later".to_string(),
                        None,
                    )
                }
                kind => (status_for(kind), err.code(), err.to_string(), details(err)),
            },
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
