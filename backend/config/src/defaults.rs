//! Config defaults. Timings and limits match [`TaskLimits::default`].

use std::path::PathBuf;

use courier_core::TaskLimits;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_TASKS_FILE: &str = "tasks.json";
pub const DEFAULT_CREDENTIALS_DIR: &str = "credentials";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `~/.courier/data`, or `./data` without a home directory.
pub fn default_data_dir() -> PathBuf {
    crate::io::config_dir().join("data")
}

pub fn default_log_dir() -> PathBuf {
    crate::io::config_dir().join("logs")
}

pub(crate) fn limits() -> TaskLimits {
    TaskLimits::default()
}
