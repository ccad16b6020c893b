//! Bounded job queue between admission and the worker pool.
//!
//! Admission never waits on the queue: [`JobSubmitter::try_submit`] either
//! takes a slot immediately or reports the queue as full. Workers share one
//! [`JobReceiver`] and suspend in [`JobReceiver::next`] while it is empty.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::error::AdmissionError;
use crate::types::TransformRequest;

/// Create a bounded queue with room for `capacity` pending requests.
///
/// A capacity of zero is raised to one.
pub fn bounded(capacity: usize) -> (JobSubmitter, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        JobSubmitter { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half, held by the admission path.
///
/// The queue closes once every submitter has been dropped.
#[derive(Debug, Clone)]
pub struct JobSubmitter {
    tx: mpsc::Sender<TransformRequest>,
}

impl JobSubmitter {
    /// Enqueue without waiting.
    pub fn try_submit(&self, request: TransformRequest) -> Result<(), AdmissionError> {
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AdmissionError::QueueFull {
                capacity: self.capacity(),
            },
            mpsc::error::TrySendError::Closed(_) => AdmissionError::Closed,
        })
    }

    /// Requests currently waiting for a worker.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Consumer half, shared by every worker.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<TransformRequest>>>,
}

impl JobReceiver {
    /// Wait for the next request in FIFO order.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<TransformRequest> {
        self.rx.lock().await.recv().await
    }
}
