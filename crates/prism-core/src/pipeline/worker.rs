//! A single processing lane: fetch → stage → transform → upload.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tracing::Instrument;

use super::queue::JobReceiver;
use super::scratch::ScratchDir;
use crate::config::Config;
use crate::convert::Converter;
use crate::error::{PipelineError, PipelineResult};
use crate::storage::{content_type_for, ObjectMetadata, ObjectStore};
use crate::types::{ObjectLocation, TransformRequest};

/// Per-worker settings derived from the config.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Parent of the per-request scratch directories
    pub scratch_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub convert_timeout: Duration,
    pub upload_timeout: Duration,
}

impl WorkerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scratch_dir: config.scratch_dir(),
            fetch_timeout: Duration::from_millis(config.limits.fetch_timeout_ms),
            convert_timeout: Duration::from_millis(config.limits.convert_timeout_ms),
            upload_timeout: Duration::from_millis(config.limits.upload_timeout_ms),
        }
    }
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What happened to one request.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The transformed image was uploaded
    Completed {
        object: ObjectMetadata,
        elapsed: Duration,
    },
    /// A stage failed; the request was dropped
    Failed {
        error: PipelineError,
        elapsed: Duration,
    },
    /// Processing panicked; the request was dropped
    Panicked { message: String, elapsed: Duration },
}

impl ProcessOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// One worker lane with its own storage client and converter handle.
pub struct Worker {
    id: usize,
    store: Arc<dyn ObjectStore>,
    converter: Arc<dyn Converter>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(
        id: usize,
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn Converter>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            id,
            store,
            converter,
            options,
        }
    }

    /// Pull requests until the queue is closed and drained.
    ///
    /// Waiting on the queue is the only point where an idle worker suspends.
    /// No request outcome, not even a panic, ends the loop.
    pub async fn run(self, queue: JobReceiver) {
        let span = tracing::info_span!("worker", id = self.id);
        async move {
            tracing::debug!("Worker started");
            while let Some(request) = queue.next().await {
                self.handle(request).await;
            }
            tracing::debug!("Queue closed, worker exiting");
        }
        .instrument(span)
        .await
    }

    /// Process one request and log its outcome and duration.
    pub async fn handle(&self, request: TransformRequest) -> ProcessOutcome {
        let span = tracing::info_span!("request", id = %request.id());
        let start = Instant::now();

        let result = AssertUnwindSafe(self.process(&request).instrument(span.clone()))
            .catch_unwind()
            .await;
        let elapsed = start.elapsed();

        span.in_scope(|| match result {
            Ok(Ok(object)) => {
                tracing::info!(
                    "Transformed {} to {} with {} profile in {:.3}s",
                    request.source(),
                    request.destination(),
                    request.profile(),
                    elapsed.as_secs_f64()
                );
                ProcessOutcome::Completed { object, elapsed }
            }
            Ok(Err(error)) => {
                if let PipelineError::Conversion { output, .. } = &error {
                    if !output.is_empty() {
                        tracing::debug!("Conversion output:\n{output}");
                    }
                }
                tracing::error!(
                    "Could not process {} -> {} ({} stage) after {:.3}s: {}",
                    request.source(),
                    request.destination(),
                    error.stage(),
                    elapsed.as_secs_f64(),
                    error
                );
                ProcessOutcome::Failed { error, elapsed }
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    "Processing {} panicked after {:.3}s: {}",
                    request.source(),
                    elapsed.as_secs_f64(),
                    message
                );
                ProcessOutcome::Panicked { message, elapsed }
            }
        })
    }

    /// Run the four stages in order. Scratch files are removed on every path.
    pub async fn process(&self, request: &TransformRequest) -> PipelineResult<ObjectMetadata> {
        let bytes = self.fetch(request.source()).await?;
        tracing::debug!("Read {} bytes from {}", bytes.len(), request.source());

        let scratch = ScratchDir::create(&self.options.scratch_dir, request)?;
        scratch.write_input(&bytes).await?;
        drop(bytes);

        with_deadline(
            request.source(),
            "transform",
            self.options.convert_timeout,
            self.converter
                .convert(request.profile(), scratch.input(), scratch.output()),
        )
        .await?;
        tracing::debug!(
            "Converted {:?} to {:?}",
            scratch.input(),
            scratch.output()
        );

        let output = scratch.read_output().await?;
        let object = self.upload(request.destination(), output).await?;

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to clean up scratch files: {e}");
        }
        Ok(object)
    }

    async fn fetch(&self, source: &ObjectLocation) -> PipelineResult<Vec<u8>> {
        let fetch = async {
            let metadata = self.store.get_object(source).await?;
            if let Some(size) = metadata.size_bytes() {
                tracing::debug!("Downloading {} ({} bytes)", source, size);
            }
            self.store.download(&metadata.media_link).await
        };
        with_deadline(source, "fetch", self.options.fetch_timeout, async {
            fetch.await.map_err(|e| PipelineError::Fetch {
                object: source.clone(),
                source: e,
            })
        })
        .await
    }

    async fn upload(
        &self,
        destination: &ObjectLocation,
        bytes: Vec<u8>,
    ) -> PipelineResult<ObjectMetadata> {
        tracing::debug!("Uploading {} bytes to {}", bytes.len(), destination);
        let content_type = content_type_for(&destination.name);
        with_deadline(destination, "upload", self.options.upload_timeout, async {
            self.store
                .insert(destination, bytes, content_type)
                .await
                .map_err(|e| PipelineError::Upload {
                    object: destination.clone(),
                    source: e,
                })
        })
        .await
    }
}

/// Bound a stage with a deadline, reporting expiry as `PipelineError::Timeout`.
async fn with_deadline<T>(
    object: &ObjectLocation,
    stage: &'static str,
    timeout: Duration,
    stage_future: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    tokio::time::timeout(timeout, stage_future)
        .await
        .map_err(|_| PipelineError::Timeout {
            object: object.clone(),
            stage,
            timeout,
        })?
}
