//! API error type that maps [`MagpieError`] variants to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use magpie_types::MagpieError;
use serde_json::json;

/// Wrapper around [`MagpieError`] that implements [`IntoResponse`].
#[derive(Debug)]
pub struct ApiError(pub MagpieError);

impl ApiError {
    /// Returns `(status, error_type, error_code)` for the wrapped error.
    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match &self.0 {
            MagpieError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_parameters",
            ),
            MagpieError::Serialization(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_json",
            ),
            MagpieError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_unavailable",
            ),
            MagpieError::Api { status, .. } => classify_remote(*status),
            MagpieError::Transport(_) => {
                (StatusCode::BAD_GATEWAY, "server_error", "workspace_unreachable")
            }
            MagpieError::Config(_) | MagpieError::Runtime(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal_error",
            ),
        }
    }
}

fn classify_remote(status: u16) -> (StatusCode, &'static str, &'static str) {
    match status {
        400 => (
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "rejected_by_workspace",
        ),
        401 => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "invalid_token",
        ),
        403 => (
            StatusCode::FORBIDDEN,
            "permission_error",
            "permission_denied",
        ),
        404 => (
            StatusCode::NOT_FOUND,
            "not_found_error",
            "resource_not_found",
        ),
        429 => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_error",
            "rate_limit_exceeded",
        ),
        _ => (StatusCode::BAD_GATEWAY, "server_error", "workspace_error"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, error_code) = self.classify();
        let msg = self.0.to_string();
        (
            status,
            Json(json!({
                "error": {
                    "message": msg,
                    "type": error_type,
                    "code": error_code,
                }
            })),
        )
            .into_response()
    }
}

impl From<MagpieError> for ApiError {
    fn from(e: MagpieError) -> Self {
        Self(e)
    }
}
