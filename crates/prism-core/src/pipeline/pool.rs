//! Fixed-size worker pool started once at startup.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::queue::{self, JobSubmitter};
use super::worker::{Worker, WorkerOptions};
use crate::config::Config;
use crate::convert::{Converter, ImageMagick};
use crate::error::{ConfigError, PrismError};
use crate::storage::{GcsClient, ObjectStore};

/// Handle to the running workers.
///
/// The pool size never changes after [`WorkerPool::start`]. The only thing to
/// do with the handle is wait for the workers once the queue has closed.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create the job queue and spawn `workers` tasks consuming it.
    ///
    /// `factory` is called once per worker id, so each worker can own its
    /// storage client.
    pub fn start<F>(
        queue_capacity: usize,
        workers: usize,
        mut factory: F,
    ) -> Result<(JobSubmitter, Self), ConfigError>
    where
        F: FnMut(usize) -> Worker,
    {
        if workers == 0 {
            return Err(ConfigError::ValidationError(
                "pool.workers must be > 0".into(),
            ));
        }
        if queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "pool.queue_capacity must be > 0".into(),
            ));
        }

        let (submitter, receiver) = queue::bounded(queue_capacity);
        let handles = (0..workers)
            .map(|id| tokio::spawn(factory(id).run(receiver.clone())))
            .collect();

        tracing::info!(
            "Started {} workers on a queue of capacity {}",
            workers,
            queue_capacity
        );
        Ok((submitter, Self { handles }))
    }

    /// Start the pool described by `config`, with one storage client per
    /// worker and a shared ImageMagick converter.
    pub fn from_config(config: &Config) -> Result<(JobSubmitter, Self), PrismError> {
        let stores = (0..config.pool.workers)
            .map(|_| GcsClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn ObjectStore>))
            .collect::<Result<Vec<_>, _>>()?;
        let converter: Arc<dyn Converter> = Arc::new(ImageMagick::new(&config.convert.program));
        let options = WorkerOptions::from_config(config);
        tracing::debug!("Scratch directory: {:?}", options.scratch_dir);

        let pool = Self::start(config.pool.queue_capacity, config.pool.workers, |id| {
            Worker::new(
                id,
                Arc::clone(&stores[id]),
                Arc::clone(&converter),
                options.clone(),
            )
        })?;
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit.
    ///
    /// Workers exit once all submitters are dropped and the queue is drained.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {e}");
            }
        }
        tracing::info!("All workers stopped");
    }
}
