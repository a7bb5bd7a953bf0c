//! Config validation with path-qualified messages.

use crate::schema::CourierConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log the warnings, then fail with every error spelled out.
    pub fn check(&self, origin: &str) -> anyhow::Result<()> {
        for warning in &self.warnings {
            tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
        }
        if self.is_valid() {
            return Ok(());
        }
        let details: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        anyhow::bail!(
            "{} invalid config value(s) in {origin}: {}",
            self.errors.len(),
            details.join("; ")
        )
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &CourierConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_timings(config, &mut report);
    validate_limits(config, &mut report);
    report
}

fn validate_server(config: &CourierConfig, report: &mut ValidationReport) {
    if config.server.bind.trim().is_empty() {
        report.error("server.bind", "Bind address must not be empty");
    }
    if config.server.port == 0 {
        report.warn("server.port", "Port 0 binds an ephemeral port");
    }
}

fn validate_timings(config: &CourierConfig, report: &mut ValidationReport) {
    let t = &config.timings;
    let intervals = [
        ("timings.watchdogIntervalSecs", t.watchdog_interval_secs),
        ("timings.staleAfterSecs", t.stale_after_secs),
        ("timings.persistIntervalSecs", t.persist_interval_secs),
    ];
    for (path, secs) in intervals {
        if secs == 0 {
            report.error(path, "Interval must be at least one second");
        }
    }
    if t.stale_after_secs > 0 && t.stale_after_secs <= t.watchdog_interval_secs {
        report.warn(
            "timings.staleAfterSecs",
            "Stale threshold is not longer than the watchdog interval",
        );
    }
    if t.login_backoff_secs == 0 {
        report.warn("timings.loginBackoffSecs", "Login retries will run back to back");
    }
}

fn validate_limits(config: &CourierConfig, report: &mut ValidationReport) {
    let l = &config.limits;
    if l.max_login_retries == 0 {
        report.error("limits.maxLoginRetries", "Must allow at least one login attempt");
    }
    if l.max_restarts == 0 {
        report.error("limits.maxRestarts", "Restart ceiling must be positive");
    }
    if l.log_capacity == 0 {
        report.error("limits.logCapacity", "Log capacity must be positive");
    }
    if l.persisted_logs > l.log_capacity {
        report.warn(
            "limits.persistedLogs",
            "More persisted logs than kept in memory; only logCapacity entries are saved",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let report = validate(&CourierConfig::default());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_intervals_and_ceilings_are_errors() {
        let mut config = CourierConfig::default();
        config.timings.watchdog_interval_secs = 0;
        config.limits.max_restarts = 0;
        let report = validate(&config);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"timings.watchdogIntervalSecs"));
        assert!(paths.contains(&"limits.maxRestarts"));
    }

    #[test]
    fn short_stale_threshold_warns() {
        let mut config = CourierConfig::default();
        config.timings.stale_after_secs = 30;
        let report = validate(&config);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "timings.staleAfterSecs");
    }

    #[test]
    fn check_lists_every_error() {
        let mut config = CourierConfig::default();
        config.timings.persist_interval_secs = 0;
        config.limits.log_capacity = 0;
        let err = validate(&config).check("config.yaml").unwrap_err().to_string();
        assert!(err.starts_with("2 invalid config value(s) in config.yaml"));
        assert!(err.contains("timings.persistIntervalSecs: Interval must be at least one second"));
        assert!(err.contains("limits.logCapacity: Log capacity must be positive"));
    }

    #[test]
    fn check_passes_with_only_warnings() {
        let mut config = CourierConfig::default();
        config.server.port = 0;
        assert!(validate(&config).check("config.yaml").is_ok());
    }
}
