//! API error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use cronsentry_core::MonitorError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or query.
    #[error("{0}")]
    BadRequest(String),

    /// No owner identity could be established.
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Monitor(e) => match e {
                MonitorError::Validation(_) | MonitorError::Schedule(_) => StatusCode::BAD_REQUEST,
                MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
                MonitorError::Forbidden(_) => StatusCode::FORBIDDEN,
                MonitorError::Conflict(_) => StatusCode::CONFLICT,
                MonitorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
