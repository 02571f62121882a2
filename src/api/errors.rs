//! API error types and HTTP status mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::executor::ExecutorError;

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Request body failed to parse or validate.
    Validation(String),
    /// Client exceeded its request budget.
    TooManyRequests(String),
    /// Service unavailable (e.g., executor shut down).
    ServiceUnavailable(String),
    /// The model did not answer in time.
    GatewayTimeout(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::Validation(msg) => ("VALIDATION_ERROR", msg),
            ApiError::TooManyRequests(msg) => ("TOO_MANY_REQUESTS", msg),
            ApiError::ServiceUnavailable(msg) => ("SERVICE_UNAVAILABLE", msg),
            ApiError::GatewayTimeout(msg) => ("TIMEOUT", msg),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Closed => {
                ApiError::ServiceUnavailable("executor is shutting down".to_string())
            }
            ExecutorError::TimedOut { .. } => {
                ApiError::GatewayTimeout("Model response timeout".to_string())
            }
            // Model errors stay in the logs.
            ExecutorError::JobFailed { .. } => {
                ApiError::Internal("Internal server error".to_string())
            }
            ExecutorError::HandleAlreadyConsumed(_) => ApiError::Internal(err.to_string()),
        }
    }
}
