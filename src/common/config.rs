//! Configuration loading.
//!
//! The logger reads a JSON configuration file:
//!
//! ```json
//! {
//!     "logger_name": "/example/logger",
//!     "db_dir": "state",
//!     "policy": { "allowed_prefixes": ["/example"] }
//! }
//! ```
//!
//! `logger_name` is required. `db_dir` is resolved relative to the
//! configuration file and defaults to the file's directory.
//!
//! # Environment Overrides
//!
//! - `SIGLOG_DB_DIR` - overrides the store directory
//! - `SIGLOG_LOG_LEVEL` - logging level (trace, debug, info, warn, error)

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse configuration file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Policy section forwarded to the submission policy checker.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Data names must fall under one of these prefixes; empty means any.
    #[serde(default)]
    pub allowed_prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    logger_name: String,
    db_dir: Option<PathBuf>,
    #[serde(default)]
    policy: PolicyConfig,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Naming prefix under which the log publishes records.
    pub logger_name: String,
    /// Directory holding the embedded store.
    pub db_dir: PathBuf,
    pub policy: PolicyConfig,
}

impl LoggerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let raw: RawConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        Self::from_raw(raw, path.parent().unwrap_or_else(|| Path::new(".")))
    }

    fn from_raw(raw: RawConfig, config_dir: &Path) -> Result<Self, ConfigError> {
        if raw.logger_name.is_empty() || !raw.logger_name.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "logger_name",
                raw.logger_name.clone(),
            ));
        }

        let db_dir = match env::var_os("SIGLOG_DB_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => match raw.db_dir {
                Some(dir) if dir.is_absolute() => dir,
                Some(dir) => config_dir.join(dir),
                None => config_dir.to_path_buf(),
            },
        };

        Ok(Self {
            logger_name: raw.logger_name,
            db_dir,
            policy: raw.policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str, dir: &str) -> Result<LoggerConfig, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json).map_err(|e| {
            ConfigError::Parse(PathBuf::from("test.json"), e)
        })?;
        LoggerConfig::from_raw(raw, Path::new(dir))
    }

    #[test]
    fn minimal_config() {
        let config = parse(r#"{"logger_name": "/example/logger"}"#, "/etc/siglog").unwrap();
        assert_eq!(config.logger_name, "/example/logger");
        assert_eq!(config.db_dir, PathBuf::from("/etc/siglog"));
        assert!(config.policy.allowed_prefixes.is_empty());
    }

    #[test]
    fn relative_db_dir_resolves_against_config_dir() {
        let config = parse(
            r#"{"logger_name": "/l", "db_dir": "state"}"#,
            "/etc/siglog",
        )
        .unwrap();
        assert_eq!(config.db_dir, PathBuf::from("/etc/siglog/state"));
    }

    #[test]
    fn absolute_db_dir_is_kept() {
        let config = parse(
            r#"{"logger_name": "/l", "db_dir": "/var/lib/siglog"}"#,
            "/etc/siglog",
        )
        .unwrap();
        assert_eq!(config.db_dir, PathBuf::from("/var/lib/siglog"));
    }

    #[test]
    fn policy_section_is_forwarded() {
        let config = parse(
            r#"{"logger_name": "/l", "policy": {"allowed_prefixes": ["/a", "/b"]}}"#,
            "/etc",
        )
        .unwrap();
        assert_eq!(config.policy.allowed_prefixes, vec!["/a", "/b"]);
    }

    #[test]
    fn logger_name_is_required_and_validated() {
        assert!(parse(r#"{"db_dir": "x"}"#, "/etc").is_err());
        assert!(matches!(
            parse(r#"{"logger_name": ""}"#, "/etc"),
            Err(ConfigError::InvalidValue("logger_name", _))
        ));
        assert!(matches!(
            parse(r#"{"logger_name": "no-slash"}"#, "/etc"),
            Err(ConfigError::InvalidValue("logger_name", _))
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        assert!(matches!(
            LoggerConfig::load("/nonexistent/siglog.json"),
            Err(ConfigError::Io(_, _))
        ));
    }
}
