//! Object storage collaborator.
//!
//! The pipeline only needs three operations from storage: look up an object's
//! metadata (including where to download it from), download bytes, and
//! insert or overwrite an object. [`ObjectStore`] captures exactly that;
//! [`GcsClient`] implements it against the Cloud Storage JSON API.

pub mod credentials;
pub mod gcs;

pub use credentials::Credentials;
pub use gcs::GcsClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::ObjectLocation;

/// Object metadata as returned by the storage API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    pub bucket: String,
    /// Location the object's bytes can be downloaded from
    #[serde(default)]
    pub media_link: String,
    #[serde(default)]
    pub self_link: Option<String>,
    /// Size in bytes, encoded as a decimal string by the API
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl ObjectMetadata {
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Storage operations used by the processing pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch metadata for an object, including its download location.
    async fn get_object(&self, location: &ObjectLocation) -> Result<ObjectMetadata, StorageError>;

    /// Download the bytes behind a `media_link`.
    async fn download(&self, media_link: &str) -> Result<Vec<u8>, StorageError>;

    /// Create or overwrite an object.
    async fn insert(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError>;
}

/// Guess a MIME type from an object name's extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
