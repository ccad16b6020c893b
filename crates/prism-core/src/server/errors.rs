//! Status code mapping for admission failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AdmissionError;

impl AdmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::QueueFull { .. } | Self::Closed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Rejections carry no body; callers only look at the status.
impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}
