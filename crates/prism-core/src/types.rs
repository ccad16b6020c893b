//! Core data types: object locations and transformation requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::convert::Profile;
use crate::error::AdmissionError;

/// Suffix inserted before the extension of a source object name to form
/// the destination object name.
pub const THUMBNAIL_SUFFIX: &str = "-t";

/// A bucket plus an object name inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub name: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Parse a `bucket/object-name` identifier.
    ///
    /// The bucket ends at the first `/`; everything after it is the object
    /// name, which may itself contain `/`.
    pub fn parse(identifier: &str) -> Result<Self, AdmissionError> {
        let trimmed = identifier.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(AdmissionError::MalformedRequest(
                "request did not provide an image id".into(),
            ));
        }
        let (bucket, name) = trimmed.split_once('/').ok_or_else(|| {
            AdmissionError::MalformedRequest(format!(
                "image id {identifier:?} is not of the form bucket/object-name"
            ))
        })?;
        let name = name.trim_start_matches('/');
        if bucket.is_empty() || name.is_empty() {
            return Err(AdmissionError::MalformedRequest(format!(
                "image id {identifier:?} is not of the form bucket/object-name"
            )));
        }
        Ok(Self::new(bucket, name))
    }

    /// Final path segment of the object name.
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

/// Derive the destination object name by inserting [`THUMBNAIL_SUFFIX`]
/// before the extension of the final path segment.
///
/// `photo.jpg` becomes `photo-t.jpg`, `README` becomes `README-t`. A leading
/// dot does not start an extension, so `.hidden` becomes `.hidden-t`. This
/// departs on purpose from a plain last-dot split, which would produce
/// `-t.hidden`.
pub fn derive_destination_name(source_name: &str) -> String {
    let segment_start = source_name.rfind('/').map_or(0, |i| i + 1);
    let segment = &source_name[segment_start..];
    match segment.rfind('.') {
        Some(dot) if dot > 0 => {
            let split = segment_start + dot;
            format!(
                "{}{}{}",
                &source_name[..split],
                THUMBNAIL_SUFFIX,
                &source_name[split..]
            )
        }
        _ => format!("{source_name}{THUMBNAIL_SUFFIX}"),
    }
}

/// A request to transform one stored image into another.
///
/// Built once at admission and handed to exactly one worker. Fields are
/// read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    id: Uuid,
    source: ObjectLocation,
    destination: ObjectLocation,
    profile: Profile,
}

impl TransformRequest {
    /// Build a request from a `bucket/object-name` identifier and the bucket
    /// the result should be written to.
    pub fn new(
        identifier: &str,
        destination_bucket: &str,
        profile: Profile,
    ) -> Result<Self, AdmissionError> {
        let source = ObjectLocation::parse(identifier)?;
        let destination_bucket = destination_bucket.trim();
        if destination_bucket.is_empty() {
            return Err(AdmissionError::MalformedRequest(
                "request did not provide a destination bucket".into(),
            ));
        }
        let destination =
            ObjectLocation::new(destination_bucket, derive_destination_name(&source.name));
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            destination,
            profile,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &ObjectLocation {
        &self.source
    }

    pub fn destination(&self) -> &ObjectLocation {
        &self.destination
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }
}
