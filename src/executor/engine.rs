//! Executor engine implementation.
//!
//! The executor owns one dedicated worker task fed by an unbounded channel.
//! Submitters push onto the channel without waiting; the worker pops one job
//! at a time, runs the model, and publishes the outcome on the job's handle.
//! Because there is exactly one consumer, at most one job is ever running.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};

use crate::core::job::{Job, JobOutcome, JobStatus};
use crate::core::model::Model;
use crate::core::types::Payload;
use crate::events::{Event, EventBus};

use super::handle::JobHandle;
use super::types::{ExecutorError, QueuedJob, WorkerState};

/// Default time `shutdown` waits for queued jobs to drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Producer side of the queue.
///
/// Sequence assignment and enqueue happen under the same lock so that
/// sequence order equals queue order.
struct QueueTail {
    tx: mpsc::UnboundedSender<QueuedJob>,
    next_sequence: u64,
}

/// Single-worker serialized job executor.
pub struct Executor {
    queue: Mutex<Option<QueueTail>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<RwLock<WorkerState>>,
    depth: Arc<AtomicUsize>,
    shutdown_timeout: Duration,
}

/// Builder for configuring an [`Executor`] before its worker starts.
pub struct ExecutorBuilder {
    model: Arc<dyn Model>,
    event_bus: Arc<EventBus>,
    shutdown_timeout: Duration,
}

impl ExecutorBuilder {
    /// Set the event bus the worker reports lifecycle events to.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Set how long `shutdown` waits for queued jobs before aborting the worker.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Spawn the worker and return the running executor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Executor {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(WorkerState::Idle));
        let depth = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            model: self.model,
            event_bus: self.event_bus,
            state: Arc::clone(&state),
            depth: Arc::clone(&depth),
        };
        let worker_task = tokio::spawn(worker.run(rx));

        Executor {
            queue: Mutex::new(Some(QueueTail {
                tx,
                next_sequence: 0,
            })),
            worker: Mutex::new(Some(worker_task)),
            state,
            depth,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl Executor {
    /// Create a builder for an executor running `model`.
    pub fn builder(model: Arc<dyn Model>) -> ExecutorBuilder {
        ExecutorBuilder {
            model,
            event_bus: Arc::new(EventBus::new()),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Start an executor with default settings.
    pub fn start(model: Arc<dyn Model>) -> Self {
        Self::builder(model).start()
    }

    /// Enqueue a job and return its handle.
    ///
    /// Never waits on the worker. Fails only once the executor is shut down.
    pub fn submit(&self, payload: Payload) -> Result<JobHandle, ExecutorError> {
        let mut queue = self.queue.lock();
        let tail = queue.as_mut().ok_or(ExecutorError::Closed)?;

        let job = Arc::new(Job::new(tail.next_sequence, payload));
        let (status_tx, status_rx) = watch::channel(JobStatus::Queued);

        // Counted before sending so the worker's decrement cannot underflow.
        self.depth.fetch_add(1, Ordering::SeqCst);
        let queued = QueuedJob {
            job: Arc::clone(&job),
            status: status_tx,
        };
        if tail.tx.send(queued).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(ExecutorError::Closed);
        }
        tail.next_sequence += 1;
        drop(queue);

        tracing::debug!(job_id = %job.id(), sequence = job.sequence(), "job_queued");
        Ok(JobHandle::new(job, status_rx))
    }

    /// Number of accepted jobs the worker has not picked up yet.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Get the current worker state.
    pub async fn worker_state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Check if the executor still accepts jobs.
    pub fn is_closed(&self) -> bool {
        self.queue.lock().is_none()
    }

    /// Stop accepting jobs and wait for the queue to drain.
    ///
    /// Jobs accepted before the call still run. If they do not finish within
    /// the shutdown timeout the worker is aborted, and waiters of the jobs it
    /// never finished get `ExecutorError::Closed`. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        // Dropping the sender lets the worker exit once the queue is empty.
        drop(self.queue.lock().take());

        let worker = self.worker.lock().take();
        let Some(mut worker) = worker else {
            return;
        };

        let pending = self.queue_depth();
        tracing::info!(
            pending,
            timeout = ?self.shutdown_timeout,
            "Executor shutting down, draining queued jobs"
        );

        let start = Instant::now();
        match tokio::time::timeout(self.shutdown_timeout, &mut worker).await {
            Ok(Ok(())) => {
                tracing::info!("Executor drained in {:?}", start.elapsed());
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Executor worker ended abnormally");
                // Jobs left in the channel were dropped with the worker.
                self.depth.store(0, Ordering::SeqCst);
                *self.state.write().await = WorkerState::Stopped;
            }
            Err(_) => {
                tracing::warn!(
                    "Executor shutdown timeout ({:?}) exceeded with {} job(s) still queued, aborting worker",
                    self.shutdown_timeout,
                    self.queue_depth()
                );
                worker.abort();
                let _ = worker.await;
                self.depth.store(0, Ordering::SeqCst);
                *self.state.write().await = WorkerState::Stopped;
            }
        }
    }
}

/// The single consumer of the executor's queue.
struct Worker {
    model: Arc<dyn Model>,
    event_bus: Arc<EventBus>,
    state: Arc<RwLock<WorkerState>>,
    depth: Arc<AtomicUsize>,
}

impl Worker {
    /// Main worker loop. Returns when every sender is gone and the queue is empty.
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueuedJob>) {
        tracing::info!(model = self.model.name(), "Executor worker started");

        while let Some(queued) = rx.recv().await {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            self.process(queued).await;
        }

        *self.state.write().await = WorkerState::Stopped;
        tracing::info!("Executor worker stopped");
    }

    /// Run one job and publish its outcome.
    async fn process(&self, queued: QueuedJob) {
        let QueuedJob { job, status } = queued;
        let job_id = job.id();

        // Published before the job's status so observers never see a
        // running job on an idle worker.
        *self.state.write().await = WorkerState::Running;

        let started_at = Instant::now();
        let started = status.send_if_modified(|current| match current.start(started_at) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        });
        if !started {
            tracing::warn!(job_id = %job_id, status = status.borrow().as_str(), "Skipping job that is not queued");
            *self.state.write().await = WorkerState::Idle;
            return;
        }

        let waited = (Utc::now() - job.submitted_at())
            .to_std()
            .unwrap_or_default();
        self.event_bus
            .emit(Event::job_started(job_id, job.sequence(), waited))
            .await;

        let outcome = run_model(Arc::clone(&self.model), Arc::clone(&job)).await;

        let finished_at = Instant::now();
        let duration = finished_at.saturating_duration_since(started_at);
        let event = match &outcome {
            JobOutcome::Success(_) => Event::job_completed(job_id, duration),
            JobOutcome::Failure(error) => Event::job_failed(job_id, error.clone(), duration),
        };

        status.send_if_modified(|current| match current.finish(outcome, finished_at) {
            Some(next) => {
                *current = next;
                true
            }
            None => false,
        });

        *self.state.write().await = WorkerState::Idle;
        self.event_bus.emit(event).await;
    }
}

/// Aborts the model task if the worker is dropped mid-job.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run the model on its own task so a panic becomes a failed outcome
/// instead of taking the worker down.
async fn run_model(model: Arc<dyn Model>, job: Arc<Job>) -> JobOutcome {
    let task = tokio::spawn(async move { model.predict(job.payload()).await });
    let _guard = AbortOnDrop(task.abort_handle());

    match task.await {
        Ok(Ok(output)) => JobOutcome::Success(output),
        Ok(Err(e)) => JobOutcome::Failure(e.to_string()),
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            JobOutcome::Failure(format!("model panicked: {}", message))
        }
        Err(e) => JobOutcome::Failure(format!("model task cancelled: {}", e)),
    }
}
