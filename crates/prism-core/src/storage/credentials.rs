//! Bearer tokens for storage requests.

use std::time::{Duration, Instant};

use reqwest::header::HeaderValue;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::{CredentialsSource, StorageConfig};
use crate::error::{ConfigError, StorageError};
use crate::transport::Transport;

/// Default compute metadata endpoint for the instance's service account token.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh cached tokens this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// A token and the instant it should be refreshed.
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Where storage requests get their `Authorization` header from.
#[derive(Debug)]
pub enum Credentials {
    /// No authorization header (emulators, public buckets)
    Anonymous,
    /// A fixed bearer token
    Static(String),
    /// Tokens fetched from the compute metadata server and cached
    MetadataServer {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl Credentials {
    pub fn metadata_server(url: impl Into<String>) -> Self {
        Self::MetadataServer {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    /// Build credentials from the storage section of the config.
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        match config.credentials {
            CredentialsSource::None => Ok(Self::Anonymous),
            CredentialsSource::Token => resolve_env_var(&config.access_token)
                .map(Self::Static)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "storage.access_token is not set (value: {:?})",
                        config.access_token
                    ))
                }),
            CredentialsSource::Metadata => Ok(Self::metadata_server(&config.metadata_url)),
        }
    }

    /// The `Authorization` header value for the next request, if any.
    pub async fn authorization<T: Transport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<Option<HeaderValue>, StorageError> {
        let token = match self {
            Self::Anonymous => return Ok(None),
            Self::Static(token) => token.clone(),
            Self::MetadataServer { url, cached } => {
                let mut cached = cached.lock().await;
                let fresh = cached
                    .as_ref()
                    .filter(|token| Instant::now() < token.refresh_at)
                    .map(|token| token.value.clone());
                match fresh {
                    Some(value) => value,
                    None => {
                        let token = fetch_metadata_token(transport, url).await?;
                        let value = token.value.clone();
                        *cached = Some(token);
                        value
                    }
                }
            }
        };
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map(Some)
            .map_err(|e| StorageError::Credentials(format!("invalid token: {e}")))
    }
}

async fn fetch_metadata_token<T: Transport + ?Sized>(
    transport: &T,
    url: &str,
) -> Result<CachedToken, StorageError> {
    let request = reqwest::Client::new()
        .get(url)
        .header("Metadata-Flavor", "Google")
        .build()
        .map_err(|e| StorageError::Url(e.to_string()))?;
    let response = transport
        .execute(request)
        .await
        .map_err(|e| StorageError::Credentials(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StorageError::Credentials(format!(
            "metadata server returned HTTP {status}"
        )));
    }
    let token: MetadataTokenResponse = response
        .json()
        .await
        .map_err(|e| StorageError::Credentials(format!("bad token response: {e}")))?;
    tracing::debug!("Fetched storage token, expires in {}s", token.expires_in);

    let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
    Ok(CachedToken {
        value: token.access_token,
        refresh_at: Instant::now() + lifetime,
    })
}
