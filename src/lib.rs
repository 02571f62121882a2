//! predictor - a prediction service with a single-worker job executor.
//!
//! Requests are accepted concurrently, queued, and run through the model one
//! at a time in arrival order. Callers wait for their own result with a
//! deadline; a caller giving up never cancels or reorders queued work.

pub mod api;
pub mod config;
pub mod core;
pub mod events;
pub mod executor;
pub mod metrics;
pub mod testing;

pub use api::{ApiConfig, ApiError, ApiState, build_router, create_api_state};
pub use config::{ConfigError, Settings, SettingsLoader};
pub use core::job::{Job, JobOutcome, JobStatus};
pub use core::model::{Model, ModelError, StubModel};
pub use core::types::{JobId, Payload};
pub use events::{Event, EventBus, EventHandler, LoggingHandler};
pub use executor::{Executor, ExecutorBuilder, ExecutorError, JobHandle, WorkerState};
pub use metrics::{Metrics, MetricsRecorder};
