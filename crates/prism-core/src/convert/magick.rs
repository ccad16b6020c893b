//! ImageMagick subprocess converter.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Converter, Profile};
use crate::error::PipelineError;

/// Runs the ImageMagick `convert` binary (or a compatible program).
#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: PathBuf,
}

impl ImageMagick {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for ImageMagick {
    fn default() -> Self {
        Self::new("convert")
    }
}

/// Join stdout and stderr into one diagnostic string.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !combined.is_empty() && !stderr.is_empty() && !combined.ends_with('\n') {
        combined.push('\n');
    }
    combined.push_str(&stderr);
    combined.trim_end().to_string()
}

#[async_trait]
impl Converter for ImageMagick {
    async fn convert(
        &self,
        profile: Profile,
        input: &Path,
        output: &Path,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            "Running {} with {} profile on {:?}",
            self.program.display(),
            profile,
            input
        );

        // kill_on_drop: a stage deadline drops this future and must not leave
        // the child running.
        let result = Command::new(&self.program)
            .args(profile.args(input, output))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError::Conversion {
                input: input.to_path_buf(),
                message: format!("failed to start {}: {e}", self.program.display()),
                output: String::new(),
            })?;

        if result.status.success() {
            Ok(())
        } else {
            Err(PipelineError::Conversion {
                input: input.to_path_buf(),
                message: format!("{} exited with {}", self.program.display(), result.status),
                output: combined_output(&result.stdout, &result.stderr),
            })
        }
    }
}
