//! Job definition and per-job lifecycle state.
//!
//! A job is an immutable payload accepted by the executor. Its status moves
//! `Queued -> Running -> Completed` or `Queued -> Running -> Failed`, and a
//! terminal status never changes again.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

use super::types::{JobId, Payload};

/// A unit of submitted work.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier.
    id: JobId,
    /// Position in the executor's acceptance order.
    sequence: u64,
    /// Model input.
    payload: Payload,
    /// Wall-clock submission time.
    submitted_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job with a fresh id.
    pub fn new(sequence: u64, payload: Payload) -> Self {
        Self {
            id: JobId::new(),
            sequence,
            payload,
            submitted_at: Utc::now(),
        }
    }

    /// Get the job ID.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Get the acceptance sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Get the model input.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Get the submission timestamp.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// Result of running the model on a job, as handed from the worker to the handle.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The model produced an output payload.
    Success(Payload),
    /// The model returned an error or panicked.
    Failure(String),
}

/// Start and end instants of a job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimings {
    pub started_at: Instant,
    pub finished_at: Instant,
}

impl JobTimings {
    /// Time spent inside the model.
    pub fn duration(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}

/// Observable status of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Accepted, waiting for the worker.
    Queued,
    /// The worker is executing the job.
    Running { started_at: Instant },
    /// Finished with an output payload.
    Completed { output: Payload, timings: JobTimings },
    /// Finished with an error description.
    Failed { error: String, timings: JobTimings },
}

impl JobStatus {
    /// Check if the job has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Timings of a finished job.
    pub fn timings(&self) -> Option<JobTimings> {
        match self {
            JobStatus::Completed { timings, .. } | JobStatus::Failed { timings, .. } => {
                Some(*timings)
            }
            _ => None,
        }
    }

    /// Short lowercase name, used for logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running { .. } => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }

    /// Move a queued job into `Running`.
    ///
    /// Returns `None` if the job is not queued.
    pub fn start(&self, started_at: Instant) -> Option<JobStatus> {
        match self {
            JobStatus::Queued => Some(JobStatus::Running { started_at }),
            _ => None,
        }
    }

    /// Move a running job into its terminal status.
    ///
    /// Returns `None` if the job is not running.
    pub fn finish(&self, outcome: JobOutcome, finished_at: Instant) -> Option<JobStatus> {
        let JobStatus::Running { started_at } = self else {
            return None;
        };
        let timings = JobTimings {
            started_at: *started_at,
            finished_at,
        };
        Some(match outcome {
            JobOutcome::Success(output) => JobStatus::Completed { output, timings },
            JobOutcome::Failure(error) => JobStatus::Failed { error, timings },
        })
    }
}
