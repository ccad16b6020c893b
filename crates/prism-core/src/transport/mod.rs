//! Outbound HTTP transport.
//!
//! Every call the storage client makes goes through a [`Transport`]. The
//! production stack is a [`RetryTransport`] wrapping a `reqwest::Client`.

pub mod retry;

pub use retry::{RetryPolicy, RetryTransport, DEFAULT_RETRYABLE_STATUS_CODES};

use async_trait::async_trait;

use crate::error::TransportError;

/// Executes a fully-built HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: reqwest::Request)
        -> Result<reqwest::Response, TransportError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, TransportError> {
        Ok(reqwest::Client::execute(self, request).await?)
    }
}
