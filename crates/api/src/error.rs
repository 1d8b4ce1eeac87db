//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use purchase::{ErrorKind, PurchaseError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Purchase flow error, mapped by its kind.
    Purchase(PurchaseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Purchase(err) => purchase_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn purchase_error_to_response(err: PurchaseError) -> (StatusCode, String) {
    if matches!(err, PurchaseError::CsrfMismatch) {
        return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string());
    }

    match err.kind() {
        ErrorKind::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        ErrorKind::Forbidden | ErrorKind::PreconditionFailed => {
            (StatusCode::FORBIDDEN, err.to_string())
        }
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::ExternalServiceFailure => {
            tracing::error!(error = %err, "external service failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        ErrorKind::StorageFailure => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Purchase(err)
    }
}
