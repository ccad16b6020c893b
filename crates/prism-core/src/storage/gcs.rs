//! Cloud Storage JSON API client.
//!
//! Only the three calls the pipeline needs are implemented. Every request is
//! executed through a [`Transport`], normally a [`RetryTransport`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Body, Method, Request, Response, Url};

use super::{Credentials, ObjectMetadata, ObjectStore};
use crate::config::Config;
use crate::error::{PrismError, StorageError, TransportError};
use crate::transport::{RetryPolicy, RetryTransport, Transport};
use crate::types::ObjectLocation;

/// Error bodies longer than this are truncated in `StorageError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 512;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Storage client speaking the Cloud Storage JSON API.
pub struct GcsClient<T> {
    transport: T,
    endpoint: Url,
    credentials: Credentials,
    max_object_bytes: u64,
}

impl GcsClient<RetryTransport<reqwest::Client>> {
    /// Build a client with its own HTTP connection pool, wrapped in the
    /// configured retry policy.
    pub fn from_config(config: &Config) -> Result<Self, PrismError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.transport.request_timeout_ms))
            .build()
            .map_err(|e| StorageError::Transport(TransportError::Http(e)))?;
        let transport = RetryTransport::new(http, RetryPolicy::from_config(&config.transport));
        tracing::debug!(
            "Storage requests to {} are tried up to {} times",
            config.storage.endpoint,
            transport.policy().max_tries()
        );
        let credentials = Credentials::from_config(&config.storage)?;
        let client = Self::new(transport, &config.storage.endpoint, credentials)?
            .with_max_object_bytes(config.limits.max_object_size_mb.saturating_mul(BYTES_PER_MB));
        Ok(client)
    }
}

impl<T: Transport> GcsClient<T> {
    pub fn new(
        transport: T,
        endpoint: &str,
        credentials: Credentials,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StorageError::Url(format!("{endpoint:?}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(StorageError::Url(format!("{endpoint} cannot be a base URL")));
        }
        Ok(Self {
            transport,
            endpoint,
            credentials,
            max_object_bytes: u64::MAX,
        })
    }

    pub fn with_max_object_bytes(mut self, max_object_bytes: u64) -> Self {
        self.max_object_bytes = max_object_bytes;
        self
    }

    /// `{endpoint}/{prefix...}/b/{bucket}/o`, with every segment percent-encoded.
    fn bucket_url(&self, prefix: &[&str], bucket: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(prefix)
                .extend(["b", bucket, "o"]);
        }
        url
    }

    fn object_url(&self, location: &ObjectLocation) -> Url {
        let mut url = self.bucket_url(&["storage", "v1"], &location.bucket);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&location.name);
        }
        url
    }

    fn upload_url(&self, location: &ObjectLocation) -> Url {
        let mut url = self.bucket_url(&["upload", "storage", "v1"], &location.bucket);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &location.name);
        url
    }

    /// A request with the current `Authorization` header attached.
    async fn request(&self, method: Method, url: Url) -> Result<Request, StorageError> {
        let mut request = Request::new(method, url);
        if let Some(value) = self.credentials.authorization(&self.transport).await? {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    async fn send(&self, request: Request) -> Result<Response, StorageError> {
        let response = self.transport.execute(request).await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        url,
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

async fn decode_metadata(response: Response) -> Result<ObjectMetadata, StorageError> {
    let url = response.url().to_string();
    response
        .json::<ObjectMetadata>()
        .await
        .map_err(|e| StorageError::Decode {
            url,
            message: e.to_string(),
        })
}

#[async_trait]
impl<T: Transport> ObjectStore for GcsClient<T> {
    async fn get_object(&self, location: &ObjectLocation) -> Result<ObjectMetadata, StorageError> {
        let request = self.request(Method::GET, self.object_url(location)).await?;
        let metadata = decode_metadata(self.send(request).await?).await?;
        if metadata.media_link.is_empty() {
            return Err(StorageError::Decode {
                url: self.object_url(location).to_string(),
                message: "object metadata has no mediaLink".into(),
            });
        }
        Ok(metadata)
    }

    async fn download(&self, media_link: &str) -> Result<Vec<u8>, StorageError> {
        let url = Url::parse(media_link)
            .map_err(|e| StorageError::Url(format!("{media_link:?}: {e}")))?;
        let request = self.request(Method::GET, url).await?;
        let response = self.send(request).await?;

        let too_large = || StorageError::TooLarge {
            url: media_link.to_string(),
            max_bytes: self.max_object_bytes,
        };
        let expected = response.content_length().unwrap_or(0);
        if expected > self.max_object_bytes {
            return Err(too_large());
        }

        let mut bytes = Vec::with_capacity(expected as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(TransportError::from)?;
            if (bytes.len() + chunk.len()) as u64 > self.max_object_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn insert(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        let mut request = self.request(Method::POST, self.upload_url(location)).await?;
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|_| StorageError::Url(format!("invalid content type {content_type:?}")))?;
        request.headers_mut().insert(CONTENT_TYPE, content_type);
        *request.body_mut() = Some(Body::from(bytes));

        decode_metadata(self.send(request).await?).await
    }
}
