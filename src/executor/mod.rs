//! Single-worker task executor.
//!
//! Jobs are accepted from any number of callers and run strictly one at a
//! time, in the order they were accepted. Callers wait on a [`JobHandle`]
//! with a deadline; giving up on the wait never cancels the job.

mod engine;
mod handle;
mod types;

pub use engine::{DEFAULT_SHUTDOWN_TIMEOUT, Executor, ExecutorBuilder};
pub use handle::JobHandle;
pub use types::{ExecutorError, WorkerState};
