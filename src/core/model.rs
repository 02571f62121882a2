//! Model trait and error types.
//!
//! The `Model` trait is the computation the executor's worker runs for every
//! job. Implement it to plug real inference in place of [`StubModel`].

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

use super::types::Payload;

/// Errors a model can raise while producing a prediction.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Inference itself failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A computation that turns one payload into another.
///
/// The executor never calls `predict` concurrently: implementations may
/// assume exclusive access to whatever resource they wrap.
///
/// # Example
///
/// ```ignore
/// use predictor::{Model, ModelError, Payload};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Model for Echo {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     async fn predict(&self, input: &Payload) -> Result<Payload, ModelError> {
///         Ok(input.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait Model: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produce an output payload for `input`.
    async fn predict(&self, input: &Payload) -> Result<Payload, ModelError>;
}

/// Stand-in model that sleeps a random duration and returns a fixed answer.
#[derive(Debug, Clone)]
pub struct StubModel {
    delay: RangeInclusive<Duration>,
    answer: String,
}

impl StubModel {
    /// Create a stub whose latency is drawn uniformly from `min..=max`.
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            delay: min..=max,
            answer: "...".to_string(),
        }
    }

    /// Replace the fixed answer.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = answer.into();
        self
    }

    /// Latency range of this stub.
    pub fn delay(&self) -> &RangeInclusive<Duration> {
        &self.delay
    }

    fn sample_delay(&self) -> Duration {
        let min = self.delay.start().as_millis() as u64;
        let max = self.delay.end().as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(40))
    }
}

#[async_trait]
impl Model for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn predict(&self, _input: &Payload) -> Result<Payload, ModelError> {
        let delay = self.sample_delay();
        tokio::time::sleep(delay).await;

        let mut output = Payload::new();
        output.insert("answer".to_string(), Value::String(self.answer.clone()));
        Ok(output)
    }
}
