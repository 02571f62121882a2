//! Configuration loading and parsing.
//!
//! This module provides the service settings, read from an optional YAML
//! file and overridden by environment variables.

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::SettingsLoader;
pub use types::{
    CorsSettings, LogFormat, LoggingSettings, ModelSettings, RateLimit, ServerSettings, Settings,
};
