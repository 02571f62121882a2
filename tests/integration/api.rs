//! API integration tests.
//!
//! These tests drive the router directly with `oneshot` requests.

use predictor::api::{ApiState, build_router, create_api_state};
use predictor::config::{CorsSettings, RateLimit};
use predictor::testing::{FailingModel, FixedDelayModel};
use predictor::{Executor, Metrics, Model};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Create a test API state around `model`.
fn create_test_state(model: Arc<dyn Model>, timeout: Duration, limit: RateLimit) -> ApiState {
    let executor = Arc::new(Executor::start(model));
    create_api_state(executor, Arc::new(Metrics::new()), limit, timeout)
}

fn echo_router() -> (Router, ApiState) {
    let state = create_test_state(
        FixedDelayModel::new(Duration::from_millis(5)),
        Duration::from_secs(2),
        RateLimit::default(),
    );
    (build_router(state.clone(), &CorsSettings::default()), state)
}

fn predict_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn question() -> Value {
    json!({
        "question": "What is the meaning of life?",
        "is_philosophy_related": true
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

/// Test: Health endpoint responds with status healthy.
#[tokio::test]
async fn test_health_endpoint() {
    let (router, _) = echo_router();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

/// Test: Root endpoint returns the welcome message.
#[tokio::test]
async fn test_root_endpoint() {
    let (router, _) = echo_router();

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Welcome to the Concurrent ML API!");
}

/// Test: Predict returns the model's output.
#[tokio::test]
async fn test_predict_success() {
    let (router, _) = echo_router();

    let response = router
        .oneshot(predict_request(json!({
            "question": "Why?",
            "is_philosophy_related": false,
            "metadata": {"user": "tester"}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["question"], "Why?");
    assert_eq!(json["is_philosophy_related"], false);
    assert_eq!(json["metadata"]["user"], "tester");
}

/// Test: A body missing required fields is rejected with 422.
#[tokio::test]
async fn test_predict_invalid_body() {
    let (router, state) = echo_router();

    let response = router
        .oneshot(predict_request(json!({"question": "Why?"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");

    assert_eq!(
        state
            .metrics
            .predictions
            .get(&["/predict", "validation_error"]),
        1.0
    );
    assert_eq!(state.executor.queue_depth(), 0);
}

/// Test: Malformed JSON is also a validation error.
#[tokio::test]
async fn test_predict_malformed_json() {
    let (router, _) = echo_router();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// Test: A model slower than the request timeout yields 504.
#[tokio::test]
async fn test_predict_timeout() {
    let state = create_test_state(
        FixedDelayModel::new(Duration::from_millis(500)),
        Duration::from_millis(20),
        RateLimit::default(),
    );
    let router = build_router(state.clone(), &CorsSettings::default());

    let response = router.oneshot(predict_request(question())).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TIMEOUT");
    assert_eq!(
        state.metrics.predictions.get(&["/predict", "timed_out"]),
        1.0
    );
}

/// Test: A failing model yields 500 without leaking the model error.
#[tokio::test]
async fn test_predict_model_failure() {
    let state = create_test_state(
        FailingModel::always(),
        Duration::from_secs(1),
        RateLimit::default(),
    );
    let router = build_router(state, &CorsSettings::default());

    let response = router.oneshot(predict_request(question())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("injected"));
}

/// Test: Predict after executor shutdown yields 503.
#[tokio::test]
async fn test_predict_after_shutdown() {
    let (router, state) = echo_router();
    state.executor.shutdown().await;

    let response = router.oneshot(predict_request(question())).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Test: Requests over the budget are refused with 429 and Retry-After.
#[tokio::test]
async fn test_predict_rate_limited() {
    let state = create_test_state(
        FixedDelayModel::new(Duration::from_millis(1)),
        Duration::from_secs(1),
        RateLimit::new(2, Duration::from_secs(3600)),
    );
    let router = build_router(state, &CorsSettings::default());

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(predict_request(question()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(predict_request(question()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let json = body_json(response).await;
    assert_eq!(json["code"], "TOO_MANY_REQUESTS");

    // Other endpoints are not limited.
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Test: Metrics endpoint exposes request and prediction series.
#[tokio::test]
async fn test_metrics_endpoint() {
    let (router, _) = echo_router();

    let response = router
        .clone()
        .oneshot(predict_request(question()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));

    let text = body_text(response).await;
    assert!(text.contains(r#"predictions_total{endpoint="/predict",status="success"} 1"#));
    assert!(text.contains(r#"request_total{method="POST",endpoint="/predict",status="200"} 1"#));
    assert!(text.contains(r#"model_latency_seconds_count{endpoint="/predict",status="success"} 1"#));
    assert!(text.contains("executor_queue_depth 0"));
}

/// Test: Unknown routes get a JSON 404.
#[tokio::test]
async fn test_unknown_route() {
    let (router, state) = echo_router();

    let request = Request::builder()
        .uri("/nope")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(state.metrics.render().contains(r#"status="404"} 1"#));
}

/// Test: Explicit origins are echoed back with credentials allowed.
#[tokio::test]
async fn test_cors_with_explicit_origins() {
    let state = create_test_state(
        FixedDelayModel::new(Duration::from_millis(1)),
        Duration::from_secs(1),
        RateLimit::default(),
    );
    let cors = CorsSettings {
        origins: "https://app.example,https://admin.example".to_string(),
    };
    let router = build_router(state, &cors);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict")
        .header(header::ORIGIN, "https://admin.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://admin.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}

/// Test: The default policy allows any origin.
#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let (router, _) = echo_router();

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
