//! Bridge service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. User-facing
//! errors carry a fixed `errmsg`; upstream and internal failures are logged
//! server-side and answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned for every failed callback signature check.
///
/// Bad digests and stale timestamps share it so callers cannot tell which
/// check failed.
pub const CALLBACK_VERIFICATION_FAILED: &str = "Callback signature verification failed";

/// Message returned when a message receiver is not a valid open ID.
pub const OPEN_ID_ILLEGAL: &str = "OpenID illegal";

/// Bridge service error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400
/// - Unauthorized: 401
/// - NotFound: 404 with an empty object body
/// - Upstream: 502
/// - Internal: 500
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found")]
    NotFound,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal,
}

impl BridgeError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::BadRequest(_) => 400,
            BridgeError::Unauthorized(_) => 401,
            BridgeError::NotFound => 404,
            BridgeError::Upstream(_) => 502,
            BridgeError::Internal => 500,
        }
    }

    /// The single authentication error used by callback verification.
    pub fn callback_verification_failed() -> Self {
        BridgeError::Unauthorized(CALLBACK_VERIFICATION_FAILED.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    errmsg: String,
}

#[derive(Serialize)]
struct EmptyResponse {}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, errmsg) = match self {
            BridgeError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason),
            BridgeError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason),
            BridgeError::NotFound => {
                return (StatusCode::NOT_FOUND, Json(EmptyResponse {})).into_response();
            }
            BridgeError::Upstream(detail) => {
                // Log actual failure server-side, return generic message to client
                tracing::error!(target: "bridge.upstream", error = %detail, "Upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream service unavailable".to_string(),
                )
            }
            BridgeError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        };

        (status, Json(ErrorResponse { errmsg })).into_response()
    }
}
