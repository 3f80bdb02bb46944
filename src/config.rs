//! Database settings
//!
//! Loaded from JSON (file or string) or taken from `Default`. Every field
//! is optional in the JSON form; absent fields keep their defaults.
//! Settings are immutable once a `Database` is opened with them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Severity};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Snapshot isolation for reads; when off, FOR UPDATE takes table locks.
    pub multi_version: bool,
    /// Allow FOR UPDATE under multi-version concurrency (second-pass row locks).
    pub select_for_update_mvcc: bool,
    /// Walk a low-cardinality index for single-column `SELECT DISTINCT`.
    pub optimize_distinct: bool,
    /// Scan nested join sub-chains as a unit; when off they are flattened.
    pub nested_joins: bool,
    pub lock_timeout_ms: u64,
    /// Zero disables the statement deadline.
    pub query_timeout_ms: u64,
    /// Beyond this many filters the optimizer keeps the declared join order.
    pub max_optimizer_permutation_tables: usize,
    pub log_level: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            multi_version: true,
            select_for_update_mvcc: true,
            optimize_distinct: true,
            nested_joins: true,
            lock_timeout_ms: 1000,
            query_timeout_ms: 0,
            max_optimizer_permutation_tables: 7,
            log_level: "WARN".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let settings: DatabaseSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.log_severity()?;
        if self.max_optimizer_permutation_tables == 0 {
            return Err(ConfigError::Invalid {
                field: "max_optimizer_permutation_tables",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "lock_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn log_severity(&self) -> ConfigResult<Severity> {
        self.log_level
            .parse::<Severity>()
            .map_err(|reason| ConfigError::Invalid {
                field: "log_level",
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DatabaseSettings::default();
        assert!(settings.multi_version);
        assert!(settings.optimize_distinct);
        assert_eq!(settings.lock_timeout_ms, 1000);
        assert_eq!(settings.query_timeout_ms, 0);
        assert_eq!(settings.log_severity().unwrap(), Severity::Warn);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            DatabaseSettings::from_json(r#"{"multi_version": false, "log_level": "info"}"#).unwrap();
        assert!(!settings.multi_version);
        assert!(settings.nested_joins);
        assert_eq!(settings.log_severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_invalid_log_level() {
        let err = DatabaseSettings::from_json(r#"{"log_level": "chatty"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "log_level", .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = DatabaseSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_permutation_limit_rejected() {
        let err =
            DatabaseSettings::from_json(r#"{"max_optimizer_permutation_tables": 0}"#).unwrap_err();
        assert!(err.to_string().contains("max_optimizer_permutation_tables"));
    }
}
