//! The downstream handler's error type. Deliberately small: the admission
//! chain's own failures all travel as `AdmissionError::Rejected`, so this
//! only needs to cover what a business handler itself can fail with.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone)]
pub struct DownstreamError {
    pub status: StatusCode,
    pub message: String,
}

impl DownstreamError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for DownstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "downstream handler error ({}): {}", self.status, self.message)
    }
}

impl std::error::Error for DownstreamError {}

impl IntoResponse for DownstreamError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
