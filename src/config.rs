//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional; omitted fields take
//! their defaults.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/stagegraph",
//!   "schema_path": "/etc/stagegraph/schema.json",
//!   "audit_log_path": "/var/log/stagegraph/audit.log",
//!   "log_level": "info",
//!   "record_recursive_publishes": true,
//!   "sync_derived_records": true
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Invalid config JSON: {0}")]
    Malformed(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Unreadable { .. } => "STAGE_CONFIG_UNREADABLE",
            ConfigError::Malformed(_) => "STAGE_CONFIG_MALFORMED",
            ConfigError::Invalid(_) => "STAGE_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `state.json`. In-memory only when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Schema document or directory of documents.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,

    /// Append-only audit log file. Audit records are discarded when unset.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Record a published changeset for every recursive publish (default: true)
    #[serde(default = "default_true")]
    pub record_recursive_publishes: bool,

    /// Mirror source fields into derived records (default: true)
    #[serde(default = "default_true")]
    pub sync_derived_records: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            schema_path: None,
            audit_log_path: None,
            log_level: default_log_level(),
            record_recursive_publishes: default_true(),
            sync_derived_records: default_true(),
        }
    }
}

impl EngineConfig {
    /// In-memory engine persisting to `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.severity()?;

        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("data_dir must not be empty".into()));
            }
            if dir.is_file() {
                return Err(ConfigError::Invalid(format!(
                    "data_dir '{}' is a file",
                    dir.display()
                )));
            }
        }

        if let Some(path) = &self.audit_log_path {
            if path.is_dir() {
                return Err(ConfigError::Invalid(format!(
                    "audit_log_path '{}' is a directory",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Parsed `log_level`.
    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: crate::observability::ParseSeverityError| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.record_recursive_publishes);
        assert!(config.sync_derived_records);
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_json_str(
            r#"{"log_level": "warn", "record_recursive_publishes": false, "data_dir": "/tmp/x"}"#,
        )
        .unwrap();
        assert_eq!(config.severity().unwrap(), Severity::Warn);
        assert!(!config.record_recursive_publishes);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_invalid_log_level() {
        let result = EngineConfig::from_json_str(r#"{"log_level": "chatty"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_data_dir_must_not_be_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("state");
        fs::write(&file, "x").unwrap();

        let config = EngineConfig::with_data_dir(&file);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = EngineConfig::load(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }
}
