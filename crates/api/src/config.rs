use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

use imgflow_core::defaults::{
    DEFAULT_JOB_PATTERN, DEFAULT_PROGRESS_CHANNEL, DEFAULT_QUEUE_NAME, DEFAULT_QUEUE_PREFIX,
};
use imgflow_events::ReconnectConfig;

/// A missing or unusable configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Connection settings for the queue and pub/sub backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub queue_name: String,
    pub queue_prefix: String,
    /// Job name attached to every enqueued job.
    pub job_pattern: String,
    pub progress_channel: String,
}

/// Per-connection delivery settings.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Upper bound on a single outbound write.
    pub write_timeout: Duration,
    /// Messages buffered per connection before writes start waiting.
    pub outbound_capacity: usize,
    pub heartbeat_interval: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(5000),
            outbound_capacity: 64,
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// Everything except `REDIS_URL` has a default suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub redis: RedisConfig,
    pub delivery: DeliveryConfig,
    /// Backoff policy for the progress subscriber.
    pub reconnect: ReconnectConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                    |
    /// |---------------------------------|----------------------------|
    /// | `HOST`                          | `0.0.0.0`                  |
    /// | `PORT`                          | `3000`                     |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`         | `30`                       |
    /// | `REDIS_URL`                     | required                   |
    /// | `QUEUE_NAME`                    | `image-processor`          |
    /// | `QUEUE_PREFIX`                  | `bull`                     |
    /// | `JOB_PATTERN`                   | `image-processor`          |
    /// | `PROGRESS_CHANNEL`              | `image-processor-progress` |
    /// | `WS_WRITE_TIMEOUT_MS`           | `5000`                     |
    /// | `WS_OUTBOUND_CAPACITY`          | `64`                       |
    /// | `HEARTBEAT_INTERVAL_SECS`       | `30`                       |
    /// | `SUBSCRIBER_RECONNECT_ATTEMPTS` | `5`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&get, "PORT", 3000, "u16")?;

        let cors_origins: Vec<String> = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(ConfigError::Invalid {
                name: "CORS_ORIGINS",
                expected: "list of header-safe origins",
                value: bad.clone(),
            });
        }

        let request_timeout_secs: u64 = parse(&get, "REQUEST_TIMEOUT_SECS", 30, "u64")?;
        let shutdown_timeout_secs: u64 = parse(&get, "SHUTDOWN_TIMEOUT_SECS", 30, "u64")?;

        let redis = RedisConfig {
            url: get("REDIS_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("REDIS_URL"))?,
            queue_name: get("QUEUE_NAME").unwrap_or_else(|| DEFAULT_QUEUE_NAME.into()),
            queue_prefix: get("QUEUE_PREFIX").unwrap_or_else(|| DEFAULT_QUEUE_PREFIX.into()),
            job_pattern: get("JOB_PATTERN").unwrap_or_else(|| DEFAULT_JOB_PATTERN.into()),
            progress_channel: get("PROGRESS_CHANNEL")
                .unwrap_or_else(|| DEFAULT_PROGRESS_CHANNEL.into()),
        };

        let delivery = DeliveryConfig {
            write_timeout: Duration::from_millis(parse_positive(
                &get,
                "WS_WRITE_TIMEOUT_MS",
                5000,
            )?),
            outbound_capacity: parse_positive(&get, "WS_OUTBOUND_CAPACITY", 64)?,
            heartbeat_interval: Duration::from_secs(parse_positive(
                &get,
                "HEARTBEAT_INTERVAL_SECS",
                30,
            )?),
        };

        let reconnect = ReconnectConfig {
            max_attempts: parse(&get, "SUBSCRIBER_RECONNECT_ATTEMPTS", 5, "u32")?,
            ..ReconnectConfig::default()
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            redis,
            delivery,
            reconnect,
        })
    }
}

fn parse<F, T>(get: &F, name: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

/// Like [`parse`], but zero is rejected: these values size channels and
/// drive timers that cannot run with a zero period.
fn parse_positive<F, T>(get: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let value = parse(get, name, default, "positive integer")?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            expected: "positive integer",
            value: "0".into(),
        });
    }
    Ok(value)
}
