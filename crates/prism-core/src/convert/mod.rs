//! External image conversion.
//!
//! - **profile**: named argument templates for the conversion tool
//! - **magick**: runs ImageMagick's `convert` as a subprocess

pub mod magick;
pub mod profile;

pub use magick::ImageMagick;
pub use profile::Profile;

use std::path::Path;

use async_trait::async_trait;

use crate::error::PipelineError;

/// Something that can turn a staged input file into a transformed output file.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Apply `profile` to `input`, writing the result to `output`.
    async fn convert(&self, profile: Profile, input: &Path, output: &Path)
        -> Result<(), PipelineError>;
}
