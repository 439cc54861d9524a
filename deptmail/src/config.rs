//! Configuration module for environment variable parsing.
//!
//! Both binaries read their settings from the environment (optionally seeded
//! from a `.env` file). Nothing here carries a default credential or a
//! default tracker address: those must always be supplied by the operator.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Errors raised while assembling configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more required arguments were not supplied.
    #[error("missing required arguments: {}", .0.join(", "))]
    MissingArguments(Vec<String>),

    /// An argument or environment variable has an unusable value.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

// =============================================================================
// Mail Transport
// =============================================================================

/// SMTP transport and pacing settings used by the `send` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// SMTP relay host (implicit TLS)
    pub host: String,

    /// SMTP relay port
    pub port: u16,

    /// Upper bound for a single send attempt
    pub send_timeout: Duration,

    /// Pause between two consecutive send attempts
    pub pacing_delay: Duration,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            send_timeout: Duration::from_secs(30),
            pacing_delay: Duration::from_secs(5),
        }
    }
}

impl SmtpSettings {
    /// Load SMTP settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env::var("SMTP_HOST")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.host),

            port: parse_or("SMTP_PORT", defaults.port),

            send_timeout: Duration::from_millis(parse_or(
                "SEND_TIMEOUT_MS",
                defaults.send_timeout.as_millis() as u64,
            )),

            pacing_delay: Duration::from_millis(parse_or(
                "SEND_DELAY_MS",
                defaults.pacing_delay.as_millis() as u64,
            )),
        }
    }
}

// =============================================================================
// Tracker Service
// =============================================================================

/// Backing store used for the open counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterBackend {
    Redis,
    Memory,
}

impl FromStr for CounterBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidValue {
                name: "COUNTER_BACKEND".to_string(),
                reason: format!("unknown backend '{}', expected redis or memory", other),
            }),
        }
    }
}

/// Open-tracking service configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Port for the web server to listen on
    pub port: u16,

    /// Which counter store to use
    pub counter_backend: CounterBackend,

    /// Redis connection URL (only used with the redis backend)
    pub redis_url: String,

    /// Key under which the open counter is stored
    pub counter_key: String,

    /// Directory holding pixel assets; the built-in pixel is used when unset
    pub pixel_dir: Option<String>,

    /// Blob key of the pixel asset
    pub pixel_key: String,
}

impl TrackerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let counter_backend = match env::var("COUNTER_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => CounterBackend::Redis,
        };

        Ok(TrackerConfig {
            port: parse_or("PORT", 8080),

            counter_backend,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            counter_key: non_empty_var("COUNTER_KEY")
                .unwrap_or_else(|| "open_count".to_string()),

            pixel_dir: non_empty_var("PIXEL_DIR"),

            pixel_key: non_empty_var("PIXEL_KEY")
                .unwrap_or_else(|| "invisible.png".to_string()),
        })
    }
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or does not parse.
fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
