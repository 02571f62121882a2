//! API request handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::Payload;
use crate::executor::{Executor, ExecutorError};
use crate::metrics::Metrics;

use super::errors::ApiError;
use super::rate_limit::RateLimiter;
use super::responses::{HealthResponse, WelcomeResponse};

/// Endpoint label for prediction metrics.
const PREDICT_ENDPOINT: &str = "/predict";

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub executor: Arc<Executor>,
    pub metrics: Arc<Metrics>,
    pub limiter: Arc<RateLimiter>,
    /// How long `/predict` waits for the model.
    pub model_timeout: Duration,
}

impl ApiState {
    fn record_prediction(&self, status: &str, duration: Duration) {
        self.metrics
            .model_latency
            .observe(&[PREDICT_ENDPOINT, status], duration.as_secs_f64());
        self.metrics.predictions.inc(&[PREDICT_ENDPOINT, status]);
    }
}

/// Body of a prediction request.
#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub question: String,
    pub is_philosophy_related: bool,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl PredictionRequest {
    fn into_payload(self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("question".to_string(), Value::String(self.question));
        payload.insert(
            "is_philosophy_related".to_string(),
            Value::Bool(self.is_philosophy_related),
        );
        payload.insert(
            "metadata".to_string(),
            self.metadata.map(Value::Object).unwrap_or(Value::Null),
        );
        payload
    }
}

/// Landing endpoint.
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse::default())
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    tracing::debug!("health_check");
    Json(HealthResponse::default())
}

/// Run a prediction through the executor and wait for it.
pub async fn predict(
    State(state): State<ApiState>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Payload>, ApiError> {
    let started = Instant::now();

    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let duration = started.elapsed();
            let error = rejection.body_text();
            tracing::error!(error = %error, duration = duration.as_secs_f64(), "validation_error");
            state.record_prediction("validation_error", duration);
            return Err(ApiError::Validation(error));
        }
    };

    let question = request.question.clone();
    let result = match state.executor.submit(request.into_payload()) {
        Ok(handle) => handle.wait(state.model_timeout).await,
        Err(e) => Err(e),
    };
    let duration = started.elapsed();

    match result {
        Ok(output) => {
            tracing::info!(
                duration = duration.as_secs_f64(),
                question = %question,
                "prediction_success"
            );
            state.record_prediction("success", duration);
            Ok(Json(output))
        }
        Err(err) => {
            match &err {
                ExecutorError::TimedOut { job_id, .. } => {
                    tracing::warn!(
                        job_id = %job_id,
                        duration = duration.as_secs_f64(),
                        "prediction_timeout"
                    );
                }
                _ => {
                    tracing::error!(
                        error = %err,
                        duration = duration.as_secs_f64(),
                        "prediction_failed"
                    );
                }
            }
            state.record_prediction(err.as_str(), duration);
            Err(err.into())
        }
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    state
        .metrics
        .queue_depth
        .set(&[], state.executor.queue_depth() as f64);

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}
