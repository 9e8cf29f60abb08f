//! Process configuration, loaded from a TOML file with field-level
//! defaults, mirroring the reference system's `AppConfig`/`Config::load`
//! pair.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8081
}

fn default_operation_timeout_secs() -> u64 {
    10
}

fn default_sweeper_interval_secs() -> u64 {
    1
}

fn default_config_ttl_secs() -> u64 {
    600
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_logging_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            api_port: default_api_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    #[serde(default = "default_operation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_sweeper_interval_secs")]
    pub sweeper_interval_secs: u64,
    #[serde(default = "default_config_ttl_secs")]
    pub state_ttl_secs: u64,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_operation_timeout_secs(),
            sweeper_interval_secs: default_sweeper_interval_secs(),
            state_ttl_secs: default_config_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub operation: OperationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads config from `path`, falling back to defaults for any field
    /// the file omits. Returns defaults outright if the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation.timeout_secs)
    }

    pub fn sweeper_interval(&self) -> Duration {
        Duration::from_secs(self.operation.sweeper_interval_secs)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.operation.state_ttl_secs)
    }
}

/// Default config file path under the OS config directory, overridable
/// via the `OCPP_CONFIG` environment variable.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("OCPP_CONFIG") {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ocpp-processor")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.api_port, 8081);
        assert_eq!(cfg.operation.timeout_secs, 10);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(cfg.server.api_port, 8081);
    }

    #[test]
    fn load_parses_partial_overrides() {
        let dir = std::env::temp_dir().join(format!("ocpp-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[server]\napi_port = 9000\n").unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.server.api_port, 9000);
        assert_eq!(cfg.operation.timeout_secs, 10);

        std::fs::remove_file(&path).unwrap();
    }
}
