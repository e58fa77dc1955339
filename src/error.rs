use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures that end a request with a non-200 status.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The body is not JSON or lacks a required field.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The completion backend could not be reached or returned garbage.
    #[error("completion failed: {0:#}")]
    Completion(anyhow::Error),

    /// A script failed in a service that does not report errors in-band.
    #[error("{0}")]
    Fault(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Completion(_) => StatusCode::BAD_GATEWAY,
            Self::Fault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{self}");
        } else {
            tracing::warn!(status = status.as_u16(), "{self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
