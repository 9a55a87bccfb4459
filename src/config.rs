//! Exporter configuration.
//!
//! Configuration is immutable once the exporter is constructed. It can be
//! built in code (builder-style `with_*` methods) or loaded from a YAML file
//! with [`ExporterConfig::load`].

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default flush interval (30 seconds).
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Default connection timeout (3 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default duration unit (1 nanosecond, i.e. timer values pass through
/// unconverted).
pub const DEFAULT_DURATION_UNIT: Duration = Duration::from_nanos(1);

fn default_flush_interval() -> Duration {
    DEFAULT_FLUSH_INTERVAL
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_duration_unit() -> Duration {
    DEFAULT_DURATION_UNIT
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// How the export cycle reacts to a write failure on the collector socket.
///
/// The collector never acknowledges lines, so a mid-cycle write failure is
/// the only signal that data was lost. `BestEffort` keeps sending the
/// remaining metrics (a transient hiccup loses one block, not the cycle);
/// `Abort` stops the cycle at the first failure and surfaces it to the
/// scheduler log. Connection establishment failures always abort regardless
/// of this policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteErrorPolicy {
    /// Log the failure and continue with the next metric.
    #[default]
    BestEffort,
    /// Return the first write error and abort the remaining metrics.
    Abort,
}

/// Configuration for the OpenTSDB exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Collector host (IP address or DNS name; resolved at connect time).
    pub host: String,

    /// Collector port.
    pub port: u16,

    /// Interval between export cycles (default: 30s).
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Unit timer durations are scaled to before emission (default: 1ns,
    /// i.e. no conversion). For example `1ms` reports timer statistics in
    /// milliseconds.
    #[serde(default = "default_duration_unit", with = "humantime_serde")]
    pub duration_unit: Duration,

    /// Prefix prepended to every metric name (default: empty).
    #[serde(default)]
    pub prefix: String,

    /// Tags appended to every line as `key=value` pairs (default: empty).
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Timeout for establishing the collector connection (default: 3s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Reaction to mid-cycle write failures (default: best-effort).
    #[serde(default)]
    pub write_errors: WriteErrorPolicy,
}

impl ExporterConfig {
    /// Create a configuration for the given collector address with all other
    /// fields at their defaults.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            duration_unit: DEFAULT_DURATION_UNIT,
            prefix: String::new(),
            tags: BTreeMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_errors: WriteErrorPolicy::default(),
        }
    }

    /// Load and validate a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Validation("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".into()));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Validation(
                "flush interval must be non-zero".into(),
            ));
        }
        if self.duration_unit.is_zero() {
            return Err(ConfigError::Validation(
                "duration unit must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Collector address in `host:port` form.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Set the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the duration unit for timer conversion.
    pub fn with_duration_unit(mut self, unit: Duration) -> Self {
        self.duration_unit = unit;
        self
    }

    /// Set the metric name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the per-line tags.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add a single tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write error policy.
    pub fn with_write_errors(mut self, policy: WriteErrorPolicy) -> Self {
        self.write_errors = policy;
        self
    }
}
