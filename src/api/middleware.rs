//! Request monitoring middleware.

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::Metrics;

use super::rate_limit::client_key;

/// Endpoint label for requests that matched no route.
const UNMATCHED: &str = "unmatched";

/// Keeps the in-flight gauge balanced even if the request future is dropped.
struct InFlight<'a> {
    metrics: &'a Metrics,
    labels: [&'a str; 2],
}

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a Metrics, labels: [&'a str; 2]) -> Self {
        metrics.in_flight.inc(&labels);
        Self { metrics, labels }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.in_flight.dec(&self.labels);
    }
}

/// Log each request and record its duration, status and concurrency.
pub async fn monitor(State(metrics): State<Arc<Metrics>>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string());

    tracing::info!(
        method = %method,
        endpoint = %endpoint,
        client_ip = %client_key(&request),
        "request_started"
    );

    let response = {
        let _in_flight = InFlight::enter(&metrics, [&method, &endpoint]);
        next.run(request).await
    };

    let duration = started.elapsed();
    let status = response.status().as_u16().to_string();
    metrics
        .request_duration
        .observe(&[&method, &endpoint], duration.as_secs_f64());
    metrics.request_count.inc(&[&method, &endpoint, &status]);

    tracing::info!(
        method = %method,
        endpoint = %endpoint,
        duration = duration.as_secs_f64(),
        status_code = response.status().as_u16(),
        "request_ended"
    );

    response
}
