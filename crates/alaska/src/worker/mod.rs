pub mod pool;

use std::time::Duration;

use thiserror::Error;

use crate::error::TransportError;
use crate::scheduler::ClaimedJob;

pub use pool::WorkerPool;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Execution backend unreachable: {0}")]
    Transport(#[from] TransportError),
}

/// Runs one analysis step out of process and blocks until it finishes.
pub trait StepExecutor: Send + Sync {
    fn execute(&self, claimed: &ClaimedJob) -> Result<(), ExecutionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Succeeded { runtime: Duration },
    Failed { reason: String },
    /// The scheduler refused the report, e.g. the project was deleted while
    /// the step ran.
    Rejected { reason: String },
}

/// Emitted by a pool worker after each claimed job.
#[derive(Debug, Clone)]
pub struct WorkerEvent {
    pub worker_id: usize,
    pub job_id: String,
    pub project_id: String,
    pub outcome: WorkerOutcome,
}
