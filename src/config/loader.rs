//! Settings loading.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! environment variables. Command-line flags are applied by the binary on top.

use std::path::Path;
use std::str::FromStr;

use super::error::ConfigError;
use super::types::Settings;

/// Settings loader.
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::load_file(path)?,
            None => Settings::default(),
        };
        Self::apply_env(&mut settings, |key| std::env::var(key).ok())?;
        Self::validate(&settings)?;
        Ok(settings)
    }

    /// Load settings from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::YamlError(source) => ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse settings from a YAML string. Missing fields keep their defaults.
    pub fn parse(yaml: &str) -> Result<Settings, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Settings::default());
        }
        let settings: Settings = serde_yaml::from_str(yaml)?;
        Ok(settings)
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` returns the value of a variable, if set.
    pub fn apply_env(
        settings: &mut Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            settings.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            settings.server.port = parse_env("PORT", &port)?;
        }
        if let Some(timeout) = lookup("MODEL_TIMEOUT") {
            settings.model.timeout_secs = parse_env("MODEL_TIMEOUT", &timeout)?;
        }
        if let Some(min) = lookup("MODEL_MIN_DELAY_MS") {
            settings.model.min_delay_ms = parse_env("MODEL_MIN_DELAY_MS", &min)?;
        }
        if let Some(max) = lookup("MODEL_MAX_DELAY_MS") {
            settings.model.max_delay_ms = parse_env("MODEL_MAX_DELAY_MS", &max)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            settings.cors.origins = origins;
        }
        if let Some(limit) = lookup("RATE_LIMIT") {
            settings.rate_limit = parse_env("RATE_LIMIT", &limit)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT") {
            settings.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT", &timeout)?;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            settings.logging.format = parse_env("LOG_FORMAT", &format)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            settings.logging.level = level;
        }
        Ok(())
    }

    /// Validate settings.
    pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
        if settings.model.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "model.timeout_secs must be greater than zero".into(),
            ));
        }

        if settings.shutdown_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "shutdown_timeout_secs must be greater than zero".into(),
            ));
        }

        if settings.model.min_delay_ms > settings.model.max_delay_ms {
            return Err(ConfigError::InvalidConfig(format!(
                "model.min_delay_ms ({}) exceeds model.max_delay_ms ({})",
                settings.model.min_delay_ms, settings.model.max_delay_ms
            )));
        }

        if settings.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "server.host cannot be empty".into(),
            ));
        }

        if settings.cors.origin_list().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "cors.origins must list at least one origin or '*'".into(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnv {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
