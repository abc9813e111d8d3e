use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{deserialize_duration_from_ms, deserialize_duration_from_seconds};

/// Provides the default value for persist_interval_secs.
fn default_persist_interval() -> Duration {
    Duration::from_secs(10)
}

/// Provides the default value for poll_interval_ms.
fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

/// Provides the default value for retention_hours.
fn default_retention_hours() -> u32 {
    30
}

/// Provides the default value for health_history_hours.
fn default_health_history_hours() -> u32 {
    24
}

/// Provides the default value for crash_history_hours.
fn default_crash_history_hours() -> u32 {
    24
}

/// Provides the default value for shutdown_timeout_secs.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Application configuration for Vigil.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Path to the live health snapshot file.
    pub snapshot_path: PathBuf,

    /// Directory holding JSON crash dumps.
    pub crash_dir: PathBuf,

    /// The interval in milliseconds to poll the snapshot file for changes.
    #[serde(
        deserialize_with = "deserialize_duration_from_ms",
        default = "default_poll_interval"
    )]
    pub poll_interval_ms: Duration,

    /// How long a dirty slot may wait before it is persisted. Also bounds
    /// the aggregator's wake interval.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_persist_interval",
        rename = "persist_interval_secs"
    )]
    pub persist_interval: Duration,

    /// The age in hours beyond which persisted history buckets are pruned.
    /// Must be strictly larger than one bucket.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,

    /// Hours of health history folded into a report.
    #[serde(default = "default_health_history_hours")]
    pub health_history_hours: u32,

    /// Hours of crash history folded into a report.
    #[serde(default = "default_crash_history_hours")]
    pub crash_history_hours: u32,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout",
        rename = "shutdown_timeout_secs"
    )]
    pub shutdown_timeout: Duration,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;
        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// The persist period as a chrono delta, for slot scheduling.
    pub fn persist_period(&self) -> TimeDelta {
        TimeDelta::from_std(self.persist_interval)
            .expect("persist interval was validated at load time")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_hours <= 1 {
            return Err(ConfigError::Message(
                "retention_hours must be strictly larger than one bucket (1 hour)".into(),
            ));
        }
        if self.persist_interval.is_zero() || self.persist_interval > Duration::from_secs(3600) {
            return Err(ConfigError::Message(
                "persist_interval_secs must be between 1 and 3600".into(),
            ));
        }
        Ok(())
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            snapshot_path: PathBuf::from("health.json"),
            crash_dir: PathBuf::from("crashes"),
            poll_interval_ms: default_poll_interval(),
            persist_interval: default_persist_interval(),
            retention_hours: default_retention_hours(),
            health_history_hours: default_health_history_hours(),
            crash_history_hours: default_crash_history_hours(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    /// Sets the persist interval.
    pub fn persist_interval(mut self, interval: Duration) -> Self {
        self.config.persist_interval = interval;
        self
    }

    /// Sets the retention horizon in hours.
    pub fn retention_hours(mut self, hours: u32) -> Self {
        self.config.retention_hours = hours;
        self
    }

    /// Sets the snapshot file path.
    pub fn snapshot_path(mut self, path: PathBuf) -> Self {
        self.config.snapshot_path = path;
        self
    }

    /// Builds the `AppConfig`.
    pub fn build(self) -> AppConfig {
        self.config
    }
}
