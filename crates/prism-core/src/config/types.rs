//! Sub-configuration structs with their defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::convert::Profile;
use crate::storage::credentials::METADATA_TOKEN_URL;
use crate::transport::DEFAULT_RETRYABLE_STATUS_CODES;

/// HTTP admission server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the admission endpoint listens on
    pub bind: String,

    /// Host identifier returned to callers; detected when unset
    pub hostname: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:80".to_string(),
            hostname: None,
        }
    }
}

/// Worker pool sizing. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker lanes
    pub workers: usize,

    /// Requests that may wait in the queue before admission returns 503
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 50,
        }
    }
}

/// Outbound HTTP and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Attempts per request, including the first
    pub max_tries: u32,

    /// Pause between attempts in milliseconds (0 retries immediately)
    pub retry_delay_ms: u64,

    /// Per-attempt timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Response codes that trigger another attempt
    pub retryable_status_codes: Vec<u16>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_tries: 5,
            retry_delay_ms: 0,
            request_timeout_ms: 60_000,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

/// How the storage client authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsSource {
    /// Send no Authorization header
    None,
    /// Use `storage.access_token`
    Token,
    /// Ask the compute metadata server
    Metadata,
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL of the storage JSON API
    pub endpoint: String,

    /// Credential source
    pub credentials: CredentialsSource,

    /// Bearer token (supports ${ENV_VAR} syntax), used with `credentials = "token"`
    pub access_token: String,

    /// Token endpoint used with `credentials = "metadata"`
    pub metadata_url: String,

    /// Bucket used when a request omits `save-to`
    pub default_destination_bucket: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.googleapis.com".to_string(),
            credentials: CredentialsSource::Metadata,
            access_token: "${GCS_ACCESS_TOKEN}".to_string(),
            metadata_url: METADATA_TOKEN_URL.to_string(),
            default_destination_bucket: None,
        }
    }
}

/// External conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Conversion program (ImageMagick `convert` or compatible)
    pub program: String,

    /// Profile used when a request does not name one
    pub profile: Profile,

    /// Parent directory for per-request scratch directories.
    /// Empty means the system temp directory.
    pub scratch_dir: PathBuf,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            program: "convert".to_string(),
            profile: Profile::Moderate,
            scratch_dir: PathBuf::new(),
        }
    }
}

/// Per-request resource limits and stage deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest source object that will be downloaded, in megabytes
    pub max_object_size_mb: u64,

    /// Fetch stage deadline in milliseconds
    pub fetch_timeout_ms: u64,

    /// Transform stage deadline in milliseconds
    pub convert_timeout_ms: u64,

    /// Upload stage deadline in milliseconds
    pub upload_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_object_size_mb: 100,
            fetch_timeout_ms: 120_000,
            convert_timeout_ms: 120_000,
            upload_timeout_ms: 120_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
