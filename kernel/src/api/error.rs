//! Mapping of kernel errors onto HTTP responses.

use axum::{
    extract::Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::environment::EnvironmentError;
use crate::session::SessionError;

/// API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Domain-level session error.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Malformed request.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ApiError {
    /// Status code and machine-readable kind for this error.
    #[must_use]
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Session(SessionError::PathEscape(_)) => {
                (StatusCode::FORBIDDEN, "path_escape")
            }
            ApiError::Session(SessionError::UnknownSession(_)) => {
                (StatusCode::NOT_FOUND, "unknown_session")
            }
            ApiError::Session(SessionError::SessionRequired) => {
                (StatusCode::BAD_REQUEST, "session_required")
            }
            ApiError::Session(SessionError::Environment(EnvironmentError::Timeout { .. })) => {
                (StatusCode::GATEWAY_TIMEOUT, "environment_timeout")
            }
            ApiError::Session(SessionError::Environment(_)) => {
                (StatusCode::BAD_GATEWAY, "environment_failure")
            }
            ApiError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.classify();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "error_type": kind,
        }));

        (status, body).into_response()
    }
}
