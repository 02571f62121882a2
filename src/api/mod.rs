//! HTTP API module for the prediction service.
//!
//! Provides the prediction endpoint in front of the executor, plus health,
//! landing and Prometheus metrics endpoints.

mod errors;
mod handlers;
mod middleware;
mod rate_limit;
mod responses;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{ApiState, PredictionRequest};
pub use rate_limit::RateLimiter;
pub use responses::*;

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{CorsSettings, RateLimit, Settings};
use crate::executor::Executor;
use crate::metrics::Metrics;

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Allowed cross-origin callers.
    pub cors: CorsSettings,
}

impl ApiConfig {
    /// Take listener and CORS settings from the service settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            cors: settings.cors.clone(),
        }
    }
}

/// Create the API state around a running executor.
pub fn create_api_state(
    executor: Arc<Executor>,
    metrics: Arc<Metrics>,
    rate_limit: RateLimit,
    model_timeout: Duration,
) -> ApiState {
    ApiState {
        executor,
        metrics,
        limiter: Arc::new(RateLimiter::new(rate_limit)),
        model_timeout,
    }
}

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState, cors: &CorsSettings) -> Router {
    let predict = post(handlers::predict)
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/predict", predict)
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        // Middleware
        .layer(from_fn_with_state(
            Arc::clone(&state.metrics),
            middleware::monitor,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .with_state(state)
}

/// Build the CORS layer.
///
/// Credentials are only allowed with an explicit origin list.
fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    let methods = [Method::GET, Method::POST];

    if cors.allows_any() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .origin_list()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Run the API server until `shutdown` resolves.
///
/// In-flight requests are allowed to finish after the signal.
pub async fn serve<F>(config: &ApiConfig, state: ApiState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state, &config.cors);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
