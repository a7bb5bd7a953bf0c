//! Environment overrides for deployment settings.
//!
//! `COURIER_BIND`, `COURIER_PORT` and `COURIER_DATA_DIR` replace the
//! corresponding file values. Log filtering is left to `RUST_LOG`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::schema::CourierConfig;

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: CourierConfig) -> Result<CourierConfig> {
    apply_env_overrides_from(config, &std::env::vars().collect())
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_from(
    mut config: CourierConfig,
    env: &HashMap<String, String>,
) -> Result<CourierConfig> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(bind) = get("COURIER_BIND") {
        config.server.bind = bind.to_string();
    }
    if let Some(port) = get("COURIER_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("COURIER_PORT is not a valid port: {port}"))?;
    }
    if let Some(dir) = get("COURIER_DATA_DIR") {
        config.storage.data_dir = PathBuf::from(dir);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn overrides_server_and_storage() {
        let config = apply_env_overrides_from(
            CourierConfig::default(),
            &env(&[
                ("COURIER_BIND", "127.0.0.1"),
                ("COURIER_PORT", "4100"),
                ("COURIER_DATA_DIR", "/var/lib/courier"),
            ]),
        )
        .unwrap();
        assert_eq!(config.server.address(), "127.0.0.1:4100");
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/courier"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config =
            apply_env_overrides_from(CourierConfig::default(), &env(&[("COURIER_BIND", "  ")]))
                .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn bad_port_is_an_error() {
        let result =
            apply_env_overrides_from(CourierConfig::default(), &env(&[("COURIER_PORT", "http")]));
        assert!(result.unwrap_err().to_string().contains("COURIER_PORT"));
    }
}
