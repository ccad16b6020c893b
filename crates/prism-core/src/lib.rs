//! Prism Core - bounded-concurrency image transformation service.
//!
//! Prism accepts requests to transform an image stored in object storage,
//! queues them in a fixed-size queue, and processes them on a fixed pool of
//! workers. Each worker fetches the source object, runs an external
//! conversion tool over it, and uploads the result.
//!
//! # Architecture
//!
//! ```text
//! POST /process → JobQueue (bounded) → Worker × N:
//!     Fetch (storage) → Stage (scratch dir) → Transform (convert) → Upload (storage)
//! ```
//!
//! Admission never waits: a request either takes a queue slot immediately or
//! is rejected with `503`. Outbound storage calls go through a retrying
//! transport.
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{server, AdmissionState, Config, WorkerPool};
//!
//! #[tokio::main]
//! async fn main() -> prism_core::Result<()> {
//!     let config = Config::load()?;
//!     let (submitter, pool) = WorkerPool::from_config(&config)?;
//!     let state = AdmissionState::new(submitter, config.hostname());
//!     let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
//!     server::serve(listener, state, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     pool.join().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use config::Config;
pub use convert::{Converter, ImageMagick, Profile};
pub use error::{
    AdmissionError, ConfigError, PipelineError, PipelineResult, PrismError, Result,
    StorageError, TransportError,
};
pub use pipeline::{JobSubmitter, ProcessOutcome, Worker, WorkerOptions, WorkerPool};
pub use server::AdmissionState;
pub use storage::{GcsClient, ObjectMetadata, ObjectStore};
pub use transport::{RetryPolicy, RetryTransport, Transport};
pub use types::{ObjectLocation, TransformRequest};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
