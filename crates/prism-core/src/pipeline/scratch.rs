//! Per-request scratch directories.
//!
//! Each request stages its files in a fresh directory named after the request
//! id, so two requests for objects with the same name never share a path.
//! The directory and everything in it is removed when the guard is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{PipelineError, PipelineResult};
use crate::types::TransformRequest;

/// Scratch space for one request.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl ScratchDir {
    /// Create a scratch directory for `request` under `parent`.
    pub fn create(parent: &Path, request: &TransformRequest) -> PipelineResult<Self> {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::Stage {
            path: parent.to_path_buf(),
            source,
        })?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("prism-{}-", request.id()))
            .tempdir_in(parent)
            .map_err(|source| PipelineError::Stage {
                path: parent.to_path_buf(),
                source,
            })?;

        let input = dir
            .path()
            .join(local_file_name(request.source().basename(), "source"));
        let output = dir
            .path()
            .join(local_file_name(request.destination().basename(), "output"));
        Ok(Self { dir, input, output })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Staged copy of the source object.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Where the conversion tool writes its result.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Write the downloaded source bytes to [`Self::input`].
    pub async fn write_input(&self, bytes: &[u8]) -> PipelineResult<()> {
        tokio::fs::write(&self.input, bytes)
            .await
            .map_err(|source| PipelineError::Stage {
                path: self.input.clone(),
                source,
            })
    }

    /// Read the converted file back.
    pub async fn read_output(&self) -> PipelineResult<Vec<u8>> {
        tokio::fs::read(&self.output)
            .await
            .map_err(|source| PipelineError::Stage {
                path: self.output.clone(),
                source,
            })
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> PipelineResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|source| PipelineError::Stage { path, source })
    }
}

/// Turn an object basename into a safe local file name.
///
/// Only ASCII alphanumerics, `.`, `-` and `_` survive. A leading `-` is
/// escaped so the conversion tool never reads the name as an option.
fn local_file_name(basename: &str, fallback: &str) -> String {
    let mut name: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.starts_with('-') {
        name.insert(0, '_');
    }
    if name.is_empty() || name == "." || name == ".." {
        return fallback.to_string();
    }
    name
}
