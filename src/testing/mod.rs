//! Testing utilities for users of the predictor library.
//!
//! This module provides models with controllable behaviour:
//!
//! - [`FixedDelayModel`]: echoes its input after a fixed delay and records
//!   when every execution started and finished
//! - [`FailingModel`]: fails (or panics) on selected inputs
//!
//! # Example
//!
//! ```ignore
//! use predictor::executor::Executor;
//! use predictor::testing::FixedDelayModel;
//! use std::time::Duration;
//!
//! let model = FixedDelayModel::new(Duration::from_millis(50));
//! let executor = Executor::start(model.clone());
//! // ... submit jobs ...
//! assert_eq!(model.max_concurrent(), 1);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::core::model::{Model, ModelError};
use crate::core::types::Payload;

/// One recorded call to a test model.
#[derive(Debug, Clone)]
pub struct Execution {
    pub input: Payload,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// Find two recorded executions whose time ranges overlap.
///
/// Returns their indices in `executions`, or `None` if every execution
/// finished before the next one started.
pub fn find_overlap(executions: &[Execution]) -> Option<(usize, usize)> {
    let mut order: Vec<usize> = (0..executions.len()).collect();
    order.sort_by_key(|&i| executions[i].started_at);

    order.windows(2).find_map(|pair| {
        let (prev, next) = (pair[0], pair[1]);
        if executions[next].started_at < executions[prev].finished_at {
            Some((prev, next))
        } else {
            None
        }
    })
}

/// A model that echoes its input after a fixed delay.
pub struct FixedDelayModel {
    delay: Duration,
    executions: Mutex<Vec<Execution>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FixedDelayModel {
    /// Create a model that takes `delay` per call.
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            executions: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }

    /// All finished executions, in completion order.
    pub async fn executions(&self) -> Vec<Execution> {
        self.executions.lock().await.clone()
    }

    /// Number of finished executions.
    pub async fn call_count(&self) -> usize {
        self.executions.lock().await.len()
    }

    /// Highest number of calls that were ever in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Model for FixedDelayModel {
    fn name(&self) -> &str {
        "fixed_delay"
    }

    async fn predict(&self, input: &Payload) -> Result<Payload, ModelError> {
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        let started_at = Instant::now();
        tokio::time::sleep(self.delay).await;
        let finished_at = Instant::now();

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.executions.lock().await.push(Execution {
            input: input.clone(),
            started_at,
            finished_at,
        });
        Ok(input.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Error,
    Panic,
}

/// A model that fails on inputs matching a key/value pair.
///
/// Inputs that do not match are echoed back.
pub struct FailingModel {
    key: Option<String>,
    value: Value,
    mode: FailureMode,
    calls: AtomicUsize,
}

impl FailingModel {
    /// Fail every call with a `ModelError`.
    pub fn always() -> Arc<Self> {
        Arc::new(Self {
            key: None,
            value: Value::Null,
            mode: FailureMode::Error,
            calls: AtomicUsize::new(0),
        })
    }

    /// Return a `ModelError` when `input[key] == value`.
    pub fn failing_on(key: impl Into<String>, value: Value) -> Arc<Self> {
        Arc::new(Self {
            key: Some(key.into()),
            value,
            mode: FailureMode::Error,
            calls: AtomicUsize::new(0),
        })
    }

    /// Panic when `input[key] == value`.
    pub fn panicking_on(key: impl Into<String>, value: Value) -> Arc<Self> {
        Arc::new(Self {
            key: Some(key.into()),
            value,
            mode: FailureMode::Panic,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn matches(&self, input: &Payload) -> bool {
        match &self.key {
            None => true,
            Some(key) => input.get(key) == Some(&self.value),
        }
    }
}

#[async_trait]
impl Model for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn predict(&self, input: &Payload) -> Result<Payload, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.matches(input) {
            return Ok(input.clone());
        }
        match self.mode {
            FailureMode::Error => Err(ModelError::Inference("injected failure".to_string())),
            FailureMode::Panic => panic!("injected panic"),
        }
    }
}
