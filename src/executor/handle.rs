//! Job handle returned by `Executor::submit`.
//!
//! A handle observes one job's status through a watch channel whose only
//! sender belongs to the worker. Waiting races that channel against a
//! deadline; timing out releases the caller without touching the job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::core::job::{Job, JobStatus};
use crate::core::types::{JobId, Payload};

use super::types::ExecutorError;

/// Caller-facing token for a submitted job.
///
/// Clones share the same completion signal and the same "consumed" flag: the
/// terminal result is handed out once, to whichever clone gets it first.
#[derive(Clone)]
pub struct JobHandle {
    job: Arc<Job>,
    status: watch::Receiver<JobStatus>,
    consumed: Arc<AtomicBool>,
}

impl JobHandle {
    pub(crate) fn new(job: Arc<Job>, status: watch::Receiver<JobStatus>) -> Self {
        Self {
            job,
            status,
            consumed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the job ID.
    pub fn id(&self) -> JobId {
        self.job.id()
    }

    /// Get the submitted job.
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Snapshot of the job's current status.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// Check if the job reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    /// Check if the result was already delivered.
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for the job's result.
    ///
    /// Returns the output payload, or:
    /// - `TimedOut` if the deadline elapsed first; the job keeps running and
    ///   a later wait can still collect its result
    /// - `JobFailed` if the model failed
    /// - `HandleAlreadyConsumed` if an earlier wait already took the result
    /// - `Closed` if the executor dropped the job during shutdown
    pub async fn wait(&self, timeout: Duration) -> Result<Payload, ExecutorError> {
        let job_id = self.id();
        if self.is_consumed() {
            return Err(ExecutorError::HandleAlreadyConsumed(job_id));
        }

        let mut status = self.status.clone();
        let waited = tokio::time::timeout(timeout, async move {
            let terminal = status
                .wait_for(JobStatus::is_terminal)
                .await
                .map(|terminal| terminal.clone());
            terminal
        })
        .await;

        let terminal = match waited {
            Err(_) => return Err(ExecutorError::TimedOut { job_id, timeout }),
            Ok(Err(_)) => return Err(ExecutorError::Closed),
            Ok(Ok(terminal)) => terminal,
        };

        if self.consumed.swap(true, Ordering::AcqRel) {
            return Err(ExecutorError::HandleAlreadyConsumed(job_id));
        }

        match terminal {
            JobStatus::Completed { output, .. } => Ok(output),
            JobStatus::Failed { error, .. } => Err(ExecutorError::JobFailed { job_id, error }),
            // wait_for only yields terminal statuses
            JobStatus::Queued | JobStatus::Running { .. } => Err(ExecutorError::Closed),
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.id())
            .field("sequence", &self.job.sequence())
            .field("status", &self.status.borrow().as_str())
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
