//! HTTP admission surface.
//!
//! Two routes: `POST /process` admits a request onto the job queue and
//! `GET /healthcheck` reports liveness.

mod admission;
mod errors;
mod health;

pub use admission::{AdmissionState, ProcessForm};

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Build the router with its admission state.
pub fn router(state: AdmissionState) -> Router {
    Router::new()
        .route("/process", post(admission::process))
        .route("/healthcheck", get(health::healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve on `listener` until `shutdown` resolves.
///
/// The router, and with it the last queue submitter it holds, is dropped
/// when this returns, which lets the workers drain and exit.
pub async fn serve<F>(
    listener: TcpListener,
    state: AdmissionState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}
