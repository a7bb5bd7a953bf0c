//! `courier-config`: Courier runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, storage, timings, limits, logging)
//! - YAML loading with defaults for a missing file
//! - `COURIER_*` environment overrides
//! - Validation with path-qualified errors

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, apply_env_overrides_from};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::{
    CourierConfig, LimitsConfig, LoggingConfig, ServerConfig, StorageConfig, TimingsConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::path::Path;

/// Load the file, apply environment overrides and validate.
///
/// This is the main entry point for loading a config at runtime. Any
/// validation error aborts, with every offending field in the message.
pub async fn load_and_prepare(path: &Path) -> Result<CourierConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config)?;
    validate(&config).check(&path.display().to_string())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_file_names_the_bad_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());
        tokio::fs::write(&path, "limits:\n  maxLoginRetries: 0\n")
            .await
            .unwrap();

        let err = load_and_prepare(&path).await.unwrap_err().to_string();
        assert!(err.contains("limits.maxLoginRetries"), "{err}");
    }
}
