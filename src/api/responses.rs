//! API response types.

use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Landing page response.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
    pub version: &'static str,
}

impl Default for WelcomeResponse {
    fn default() -> Self {
        Self {
            message: "Welcome to the Concurrent ML API!",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
