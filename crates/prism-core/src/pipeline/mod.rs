//! Request processing pipeline.
//!
//! - **queue**: bounded job queue between admission and the workers
//! - **scratch**: per-request scratch directories
//! - **worker**: fetch → stage → transform → upload for one request at a time
//! - **pool**: starts the fixed set of workers

pub mod pool;
pub mod queue;
pub mod scratch;
pub mod worker;

pub use pool::WorkerPool;
pub use queue::{JobReceiver, JobSubmitter};
pub use scratch::ScratchDir;
pub use worker::{ProcessOutcome, Worker, WorkerOptions};
