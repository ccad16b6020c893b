//! Liveness endpoint.

use axum::http::StatusCode;

/// `GET /healthcheck`: always 200 with an empty body.
pub(crate) async fn healthcheck() -> StatusCode {
    StatusCode::OK
}
