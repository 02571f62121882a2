//! Executor type definitions.
//!
//! This module contains the error type, the worker state enum, and the queue
//! entry passed from submitters to the worker.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::core::job::{Job, JobStatus};
use crate::core::types::JobId;

/// Errors reported to callers of the executor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutorError {
    /// The executor was shut down before the job could be accepted or finished.
    #[error("executor is closed")]
    Closed,

    /// The caller's deadline elapsed first. The job keeps running.
    #[error("job {job_id} did not finish within {timeout:?}")]
    TimedOut { job_id: JobId, timeout: Duration },

    /// The model failed on this job.
    #[error("job {job_id} failed: {error}")]
    JobFailed { job_id: JobId, error: String },

    /// The job's result was already delivered through this handle.
    #[error("result of job {0} was already consumed")]
    HandleAlreadyConsumed(JobId),
}

impl ExecutorError {
    /// Short lowercase label, used as a metrics and log value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorError::Closed => "closed",
            ExecutorError::TimedOut { .. } => "timed_out",
            ExecutorError::JobFailed { .. } => "failed",
            ExecutorError::HandleAlreadyConsumed(_) => "already_consumed",
        }
    }
}

/// State of the executor's single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next job.
    Idle,
    /// Executing a job.
    Running,
    /// The worker has exited.
    Stopped,
}

/// Entry in the worker's queue.
pub(crate) struct QueuedJob {
    pub(crate) job: Arc<Job>,
    pub(crate) status: watch::Sender<JobStatus>,
}
