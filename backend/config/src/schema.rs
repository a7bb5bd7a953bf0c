//! Courier runtime configuration schema.
//!
//! Every section and field is optional in YAML; missing values take the
//! defaults from [`crate::defaults`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use courier_core::TaskLimits;

use crate::defaults;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub timings: TimingsConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::DEFAULT_BIND.to_string(),
            port: defaults::DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Task snapshot file, relative to `data_dir`.
    pub tasks_file: String,
    /// Directory for per-task credential files, relative to `data_dir`.
    pub credentials_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::default_data_dir(),
            tasks_file: defaults::DEFAULT_TASKS_FILE.to_string(),
            credentials_dir: defaults::DEFAULT_CREDENTIALS_DIR.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join(&self.tasks_file)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_dir)
    }
}

// ---------------------------------------------------------------------------
// Timings (seconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingsConfig {
    pub login_backoff_secs: u64,
    pub send_retry_delay_secs: u64,
    pub alternate_retry_delay_secs: u64,
    pub restart_backoff_secs: u64,
    pub watchdog_interval_secs: u64,
    pub stale_after_secs: u64,
    pub persist_interval_secs: u64,
    pub resume_grace_secs: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        let limits = defaults::limits();
        Self {
            login_backoff_secs: limits.login_backoff.as_secs(),
            send_retry_delay_secs: limits.send_retry_delay.as_secs(),
            alternate_retry_delay_secs: limits.alternate_retry_delay.as_secs(),
            restart_backoff_secs: limits.restart_backoff.as_secs(),
            watchdog_interval_secs: limits.watchdog_interval.as_secs(),
            stale_after_secs: limits.stale_after.as_secs(),
            persist_interval_secs: limits.persist_interval.as_secs(),
            resume_grace_secs: limits.resume_grace.as_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitsConfig {
    pub max_login_retries: u32,
    pub max_send_retries: u32,
    pub max_alternate_retries: u32,
    pub max_restarts: u32,
    /// Log entries kept in memory per task.
    pub log_capacity: usize,
    /// Log entries written to the snapshot file per task.
    pub persisted_logs: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = defaults::limits();
        Self {
            max_login_retries: limits.max_login_retries,
            max_send_retries: limits.max_send_retries,
            max_alternate_retries: limits.max_alternate_retries,
            max_restarts: limits.max_restarts,
            log_capacity: limits.log_capacity,
            persisted_logs: limits.persisted_logs,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
    /// JSON lines on the console as well as in the file.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            dir: defaults::default_log_dir(),
            json: false,
        }
    }
}

impl CourierConfig {
    /// Timings and ceilings handed to every task.
    pub fn task_limits(&self) -> TaskLimits {
        let t = &self.timings;
        let l = &self.limits;
        TaskLimits {
            max_login_retries: l.max_login_retries,
            login_backoff: Duration::from_secs(t.login_backoff_secs),
            max_send_retries: l.max_send_retries,
            send_retry_delay: Duration::from_secs(t.send_retry_delay_secs),
            max_alternate_retries: l.max_alternate_retries,
            alternate_retry_delay: Duration::from_secs(t.alternate_retry_delay_secs),
            max_restarts: l.max_restarts,
            restart_backoff: Duration::from_secs(t.restart_backoff_secs),
            watchdog_interval: Duration::from_secs(t.watchdog_interval_secs),
            stale_after: Duration::from_secs(t.stale_after_secs),
            persist_interval: Duration::from_secs(t.persist_interval_secs),
            resume_grace: Duration::from_secs(t.resume_grace_secs),
            log_capacity: l.log_capacity,
            persisted_logs: l.persisted_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_to_task_limits() {
        assert_eq!(CourierConfig::default().task_limits(), TaskLimits::default());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "server:\n  port: 8080\ntimings:\n  loginBackoffSecs: 2\n";
        let config: CourierConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.timings.login_backoff_secs, 2);
        assert_eq!(config.timings.restart_backoff_secs, 10);
        assert_eq!(config.limits.max_restarts, 1000);
        assert_eq!(config.task_limits().login_backoff, Duration::from_secs(2));
    }

    #[test]
    fn storage_paths_join_data_dir() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/srv/courier"),
            ..StorageConfig::default()
        };
        assert_eq!(storage.tasks_path(), PathBuf::from("/srv/courier/tasks.json"));
        assert_eq!(
            storage.credentials_path(),
            PathBuf::from("/srv/courier/credentials")
        );
    }
}
