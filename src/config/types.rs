//! Configuration type definitions.
//!
//! This module contains the settings structures read from YAML and the
//! environment, with the defaults the service runs with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Model and executor behaviour.
    pub model: ModelSettings,
    /// Cross-origin policy.
    pub cors: CorsSettings,
    /// Per-client limit on prediction requests.
    pub rate_limit: RateLimit,
    /// Seconds to wait for queued jobs on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            model: ModelSettings::default(),
            cors: CorsSettings::default(),
            rate_limit: RateLimit::default(),
            shutdown_timeout_secs: 30,
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Shutdown timeout as a duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Seconds a request waits for its prediction before giving up.
    pub timeout_secs: u64,
    /// Lower bound of the stub model's latency.
    pub min_delay_ms: u64,
    /// Upper bound of the stub model's latency.
    pub max_delay_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            min_delay_ms: 10_000,
            max_delay_ms: 40_000,
        }
    }
}

impl ModelSettings {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Comma separated list of allowed origins, or `*`.
    pub origins: String,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            origins: "*".to_string(),
        }
    }
}

impl CorsSettings {
    /// Check if any origin is allowed.
    pub fn allows_any(&self) -> bool {
        self.origin_list().iter().any(|o| o == "*")
    }

    /// Individual origins, trimmed, without empty entries.
    pub fn origin_list(&self) -> Vec<String> {
        self.origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human readable lines.
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
        }
    }
}

/// Request budget per client over a fixed window, written as `100/hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimit {
    pub requests: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn new(requests: u32, window: Duration) -> Self {
        Self { requests, window }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(3600))
    }
}

impl FromStr for RateLimit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, unit) = s
            .split_once('/')
            .ok_or_else(|| format!("expected '<count>/<unit>', got '{}'", s))?;

        let requests: u32 = count
            .trim()
            .parse()
            .map_err(|_| format!("invalid request count '{}'", count.trim()))?;
        if requests == 0 {
            return Err("request count must be greater than zero".to_string());
        }

        let unit = unit.trim().to_ascii_lowercase();
        let window = match unit.as_str() {
            "second" | "sec" | "s" => Duration::from_secs(1),
            "minute" | "min" | "m" => Duration::from_secs(60),
            "hour" | "h" => Duration::from_secs(3600),
            "day" | "d" => Duration::from_secs(86_400),
            other => match other.strip_suffix('s').and_then(|n| n.parse::<u64>().ok()) {
                Some(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(format!("unknown time unit '{}'", other)),
            },
        };

        Ok(Self { requests, window })
    }
}

impl TryFrom<String> for RateLimit {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateLimit> for String {
    fn from(limit: RateLimit) -> Self {
        limit.to_string()
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.window.as_secs() {
            1 => "second",
            60 => "minute",
            3600 => "hour",
            86_400 => "day",
            secs => return write!(f, "{}/{}s", self.requests, secs),
        };
        write!(f, "{}/{}", self.requests, unit)
    }
}
