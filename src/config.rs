//! # Process configuration.
//!
//! [`Settings`] is loaded once at startup from the process environment and an optional
//! `.env` file (process variables win over the file). It carries:
//! - `APP_ENV`: [`AppEnv`] (`local` | `staging` | `production`, default `local`)
//! - `LOG_LEVEL`: [`LogLevel`] (`DEBUG` | `INFO` | `WARNING` | `ERROR` | `CRITICAL`, default `INFO`)
//! - `SUPABASE_URL`, `SUPABASE_KEY`: external service credentials ([`Credentials`])
//! - coordinator tuning ([`CoordinatorConfig`]):
//!   `EVENT_QUEUE_CAPACITY`, `EVENT_POLL_INTERVAL_MS`, `STARTUP_TIMEOUT_MS`
//!
//! # Example
//! ```
//! use jobvisor::{AppEnv, LogLevel, Settings};
//!
//! let settings = Settings::from_lookup(|key| match key {
//!     "APP_ENV" => Some("staging".into()),
//!     "LOG_LEVEL" => Some("debug".into()),
//!     _ => None,
//! })
//! .unwrap();
//!
//! assert_eq!(settings.app_env, AppEnv::Staging);
//! assert_eq!(settings.log_level, LogLevel::Debug);
//! assert_eq!(settings.coordinator.queue_capacity, 1000);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::events::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY};

/// Configuration loading failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A variable holds a value outside its allowed set.
    #[error("invalid {key}={value:?}: expected {expected}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Rejected value.
        value: String,
        /// Allowed values or type.
        expected: &'static str,
    },

    /// The `.env` file exists but could not be parsed.
    #[error("failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidValue { .. } => "config_invalid_value",
            ConfigError::EnvFile(_) => "config_env_file",
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Local,
    Staging,
    Production,
}

impl FromStr for AppEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(AppEnv::Local),
            "staging" => Ok(AppEnv::Staging),
            "production" => Ok(AppEnv::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "APP_ENV",
                value: s.to_string(),
                expected: "local, staging or production",
            }),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppEnv::Local => "local",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        })
    }
}

/// Minimum log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Matching `tracing` filter. `Critical` has no tracing equivalent and maps to `ERROR`.
    pub fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::InvalidValue {
                key: "LOG_LEVEL",
                value: s.to_string(),
                expected: "DEBUG, INFO, WARNING, ERROR or CRITICAL",
            }),
        }
    }
}

/// External service credentials. `Debug` never prints the key.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Coordinator tuning.
///
/// ## Field semantics
/// - `queue_capacity`: event queue size (min 1; clamped by the bus)
/// - `poll_interval`: longest single wait of the consumer loop (`0` = default 1s)
/// - `startup_timeout`: how long `run()` waits for the bus to become ready
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub startup_timeout: Duration,
}

impl CoordinatorConfig {
    /// Reads overrides through `lookup`; missing keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(v) = lookup("EVENT_QUEUE_CAPACITY") {
            cfg.queue_capacity = parse_number("EVENT_QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("EVENT_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(parse_number("EVENT_POLL_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("STARTUP_TIMEOUT_MS") {
            cfg.startup_timeout = Duration::from_millis(parse_number("STARTUP_TIMEOUT_MS", &v)?);
        }
        Ok(cfg)
    }

    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Poll interval with `0` replaced by the default.
    #[inline]
    pub fn effective_poll_interval(&self) -> Duration {
        if self.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            self.poll_interval
        }
    }
}

impl Default for CoordinatorConfig {
    /// - `queue_capacity = 1000`
    /// - `poll_interval = 1s`
    /// - `startup_timeout = 5s`
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_timeout: Duration::from_secs(5),
        }
    }
}

/// Process-wide settings, read-only after load.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub app_env: AppEnv,
    pub log_level: LogLevel,
    pub supabase: Credentials,
    pub coordinator: CoordinatorConfig,
    /// Whether a `.env` file contributed values.
    pub env_file_loaded: bool,
}

impl Settings {
    /// Loads from the process environment and `./.env`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(".env")
    }

    /// Loads from the process environment and the given env file (a missing file is fine).
    pub fn load_from(env_file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = read_env_file(env_file.as_ref())?;
        let env_file_loaded = file.is_some();
        let file = file.unwrap_or_default();

        let mut settings = Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file.get(key).cloned())
        })?;
        settings.env_file_loaded = env_file_loaded;
        Ok(settings)
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            app_env: lookup("APP_ENV")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            log_level: lookup("LOG_LEVEL")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            supabase: Credentials {
                url: lookup("SUPABASE_URL"),
                key: lookup("SUPABASE_KEY"),
            },
            coordinator: CoordinatorConfig::from_lookup(lookup)?,
            env_file_loaded: false,
        })
    }
}

fn read_env_file(path: &Path) -> Result<Option<HashMap<String, String>>, ConfigError> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => Ok(Some(iter.collect::<Result<HashMap<_, _>, _>>()?)),
        Err(dotenvy::Error::Io(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        expected: "a non-negative integer",
    })
}
