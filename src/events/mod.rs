//! Lifecycle events and event handling.
//!
//! The executor's worker emits an event whenever a job starts or finishes,
//! so logging and metrics can observe execution without touching the queue.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::JobId;

/// Lifecycle events emitted by the executor's worker.
#[derive(Debug, Clone)]
pub enum Event {
    /// The worker picked up a job.
    JobStarted {
        job_id: JobId,
        sequence: u64,
        /// Time the job spent in the queue.
        waited: Duration,
        timestamp: Instant,
    },

    /// A job finished with an output payload.
    JobCompleted {
        job_id: JobId,
        duration: Duration,
        timestamp: Instant,
    },

    /// A job finished with an error.
    JobFailed {
        job_id: JobId,
        error: String,
        duration: Duration,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::JobStarted { timestamp, .. } => *timestamp,
            Event::JobCompleted { timestamp, .. } => *timestamp,
            Event::JobFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job the event refers to.
    pub fn job_id(&self) -> JobId {
        match self {
            Event::JobStarted { job_id, .. }
            | Event::JobCompleted { job_id, .. }
            | Event::JobFailed { job_id, .. } => *job_id,
        }
    }

    /// Create a JobStarted event.
    pub fn job_started(job_id: JobId, sequence: u64, waited: Duration) -> Self {
        Event::JobStarted {
            job_id,
            sequence,
            waited,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobCompleted event.
    pub fn job_completed(job_id: JobId, duration: Duration) -> Self {
        Event::JobCompleted {
            job_id,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a JobFailed event.
    pub fn job_failed(job_id: JobId, error: String, duration: Duration) -> Self {
        Event::JobFailed {
            job_id,
            error,
            duration,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler that writes every event to the tracing log.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::JobStarted {
                job_id,
                sequence,
                waited,
                ..
            } => {
                tracing::debug!(job_id = %job_id, sequence, waited_ms = waited.as_millis() as u64, "job_started");
            }
            Event::JobCompleted {
                job_id, duration, ..
            } => {
                tracing::info!(job_id = %job_id, duration_ms = duration.as_millis() as u64, "job_completed");
            }
            Event::JobFailed {
                job_id,
                error,
                duration,
                ..
            } => {
                tracing::error!(job_id = %job_id, error = %error, duration_ms = duration.as_millis() as u64, "job_failed");
            }
        }
    }
}
