//! Environment variable names and helpers for configuring a logger from
//! process environment.
//!
//! These are purely helpers; the core logger and backend types remain
//! decoupled from environment access.

use crate::backend::{parse_dsn, BackendConfig, DsnError};
use crate::level::{Level, ParseLevelError};

/// Minimum level to write, e.g. `debug`, `info`, `warn`, `error`.
pub const LOG_FACADE_LEVEL_ENV: &str = "LOG_FACADE_LEVEL";

/// Backend DSN, e.g. `stderr`, `stdout` or `file:///var/log/app.jsonl`.
pub const LOG_FACADE_OUTPUT_ENV: &str = "LOG_FACADE_OUTPUT";

/// Application version attached to records; passed through as-is.
pub const APP_VERSION_ENV: &str = "APP_VERSION";

pub const DEFAULT_LEVEL: Level = Level::Debug;
pub const DEFAULT_OUTPUT: &str = "stderr";

/// Error returned when environment configuration is invalid.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid {}: {0}", LOG_FACADE_LEVEL_ENV)]
    Level(#[from] ParseLevelError),

    #[error("invalid {}: {0}", LOG_FACADE_OUTPUT_ENV)]
    Output(#[from] DsnError),
}

/// Logger settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub level: Level,
    pub backend: BackendConfig,
    /// Opaque version string; empty when unset.
    pub app_version: String,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// **Errors**
    ///
    /// Fails if the level or output variable is set to something that
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary lookup function, falling back to
    /// defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let level = match lookup(LOG_FACADE_LEVEL_ENV) {
            Some(raw) => raw.parse()?,
            None => DEFAULT_LEVEL,
        };
        let output = lookup(LOG_FACADE_OUTPUT_ENV).unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
        let backend = parse_dsn(&output)?;
        let app_version = lookup(APP_VERSION_ENV).unwrap_or_default();

        Ok(Settings { level, backend, app_version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.level, Level::Debug);
        assert_eq!(settings.backend.kind, BackendKind::Stderr);
        assert_eq!(settings.app_version, "");
    }

    #[test]
    fn test_explicit_values() {
        let settings = Settings::from_lookup(lookup(&[
            (LOG_FACADE_LEVEL_ENV, "warn"),
            (LOG_FACADE_OUTPUT_ENV, "stdout"),
            (APP_VERSION_ENV, "5"),
        ]))
        .unwrap();
        assert_eq!(settings.level, Level::Warn);
        assert_eq!(settings.backend.kind, BackendKind::Stdout);
        assert_eq!(settings.app_version, "5");
    }

    #[test]
    fn test_invalid_level() {
        let err = Settings::from_lookup(lookup(&[(LOG_FACADE_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::Level(_)));
        assert!(err.to_string().contains(LOG_FACADE_LEVEL_ENV));
    }

    #[test]
    fn test_invalid_output() {
        let err = Settings::from_lookup(lookup(&[(LOG_FACADE_OUTPUT_ENV, "syslog://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Output(DsnError::UnknownScheme(_))));
    }
}
