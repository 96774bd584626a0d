use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::target::TargetRange;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_CAPACITY: i64 = 24;

/// Settings shared by every session a process starts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    /// `None` uses the protocol's default port.
    pub port: Option<u16>,
    pub capacity: i64,
    pub targets: TargetRange,
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            capacity: DEFAULT_CAPACITY,
            targets: TargetRange::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults overlaid with `SEATWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup` (keyed by environment variable name).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SEATWATCH_HOST") {
            let host = host.trim().to_string();
            if host.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "SEATWATCH_HOST",
                    value: host,
                    reason: "must not be empty".into(),
                });
            }
            self.host = host;
        }
        if let Some(port) = lookup("SEATWATCH_PORT") {
            self.port = Some(parse("SEATWATCH_PORT", &port)?);
        }
        if let Some(capacity) = lookup("SEATWATCH_CAPACITY") {
            self.capacity = parse("SEATWATCH_CAPACITY", &capacity)?;
        }
        if let Some(max) = lookup("SEATWATCH_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse("SEATWATCH_MAX_ATTEMPTS", &max)?;
        }
        if let Some(delay) = lookup("SEATWATCH_RETRY_DELAY_SECS") {
            let secs: f64 = parse("SEATWATCH_RETRY_DELAY_SECS", &delay)?;
            self.retry.delay =
                Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
                    key: "SEATWATCH_RETRY_DELAY_SECS",
                    value: delay.clone(),
                    reason: e.to_string(),
                })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity <= 0 {
            return Err(ConfigError::Invalid {
                key: "capacity",
                value: self.capacity.to_string(),
                reason: "must be positive".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "max_attempts",
                value: "0".into(),
                reason: "at least one attempt is required".into(),
            });
        }
        if self.targets.min > self.targets.max {
            return Err(ConfigError::Invalid {
                key: "targets",
                value: format!("{}..={}", self.targets.min, self.targets.max),
                reason: "empty range".into(),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
