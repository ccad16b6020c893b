//! Error types for the Prism transformation service.
//!
//! Errors are organized by concern so that each boundary (admission, transport,
//! storage, pipeline stage) can decide how far a failure is allowed to travel.
//! Pipeline errors never leave the worker that produced them.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::ObjectLocation;

/// Top-level error type for Prism operations.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors raised while admitting a request onto the job queue.
///
/// These are the only errors a caller of `POST /process` ever observes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// The request could not be turned into a `TransformRequest`
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The bounded queue has no free slot
    #[error("Queue full ({capacity} requests pending)")]
    QueueFull { capacity: usize },

    /// Every worker has exited and the queue no longer accepts work
    #[error("Queue closed")]
    Closed,
}

/// Errors from the outbound HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, TLS, or protocol failure reported by the HTTP client
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request body is a stream and cannot be replayed on retry
    #[error("Request body for {url} is not buffered and cannot be retried")]
    UnbufferedBody { url: String },
}

/// Errors from the object storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The request never produced a response
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The storage API answered with a non-success status
    #[error("Storage request to {url} failed with HTTP {status}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The response body could not be decoded
    #[error("Failed to decode storage response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The object exceeds the configured download limit
    #[error("Object at {url} exceeds {max_bytes} bytes")]
    TooLarge { url: String, max_bytes: u64 },

    /// A request URL could not be built
    #[error("Invalid storage URL: {0}")]
    Url(String),

    /// No bearer token could be obtained
    #[error("Failed to obtain storage credentials: {0}")]
    Credentials(String),
}

/// Per-request pipeline errors, organized by stage.
///
/// Each variant is scoped to a single `TransformRequest`: the worker logs it
/// and moves on to the next queued request.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Metadata lookup or download of the source object failed
    #[error("Fetch failed for {object}: {source}")]
    Fetch {
        object: ObjectLocation,
        #[source]
        source: StorageError,
    },

    /// Local scratch file could not be written or read
    #[error("Scratch I/O failed for {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external conversion tool failed or could not be started
    #[error("Conversion of {input} failed: {message}")]
    Conversion {
        input: PathBuf,
        message: String,
        output: String,
    },

    /// Upload of the transformed image failed
    #[error("Upload failed for {object}: {source}")]
    Upload {
        object: ObjectLocation,
        #[source]
        source: StorageError,
    },

    /// A stage exceeded its deadline
    #[error("Timeout in {stage} stage for {object} after {}ms", timeout.as_millis())]
    Timeout {
        object: ObjectLocation,
        stage: &'static str,
        timeout: Duration,
    },
}

impl PipelineError {
    /// Name of the stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Stage { .. } => "stage",
            Self::Conversion { .. } => "transform",
            Self::Upload { .. } => "upload",
            Self::Timeout { stage, .. } => *stage,
        }
    }
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
