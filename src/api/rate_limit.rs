//! Per-client fixed-window rate limiting.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::config::RateLimit;

use super::errors::ApiError;
use super::handlers::ApiState;

/// Number of tracked clients above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client key over fixed windows.
pub struct RateLimiter {
    limit: RateLimit,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Record a request from `key`.
    ///
    /// Returns the time until the window resets if the budget is spent.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let mut windows = self.windows.lock();

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.limit.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.limit.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit.requests {
            return Err(self.limit.window.saturating_sub(now.duration_since(entry.started)));
        }

        entry.count += 1;
        Ok(())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Client key for a request: the peer IP, or `unknown` when not served over a socket.
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting requests over the client's budget with 429.
pub async fn enforce(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let client = client_key(&request);

    match state.limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(
                client_ip = %client,
                limit = %state.limiter.limit(),
                "rate_limit_exceeded"
            );
            let mut response = ApiError::TooManyRequests(format!(
                "Rate limit exceeded: {}",
                state.limiter.limit()
            ))
            .into_response();
            // Round up so clients never retry early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}
