//! Host Configuration Module
//!
//! Handles configuration loading for the strategy host. Sources are layered,
//! later ones winning:
//!
//! 1. built-in defaults
//! 2. `strategy-host.toml` / `config/strategy-host.toml` (optional)
//! 3. an explicit file passed with `--config`
//! 4. environment variables prefixed `STRATEGY_HOST__`, e.g.
//!    `STRATEGY_HOST__SCRIPT` or `STRATEGY_HOST__RUNTIME__FUEL_LIMIT`

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use script_bridge::RuntimeConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Strategy host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Script source file to load
    pub script: PathBuf,

    /// Module name the script is loaded under
    pub module_name: String,

    /// Class extracted from the module and instantiated
    pub class_name: String,

    /// Script runtime limits
    pub runtime: RuntimeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("scripts/strategy.wat"),
            module_name: "strategy".to_string(),
            class_name: "Strategy".to_string(),
            runtime: RuntimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON instead of human-readable lines
    pub json: bool,

    /// Directory for a daily rolling JSON log file
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl HostConfig {
    /// Loads configuration from the default files, `path` and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("strategy-host").required(false))
            .add_source(File::with_name("config/strategy-host").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("STRATEGY_HOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let host_config: HostConfig = config.try_deserialize()?;

        host_config.validate()?;
        Ok(host_config)
    }

    /// Logs the effective configuration
    pub fn log_summary(&self) {
        info!("Host configuration loaded:");
        info!("  Script: {}", self.script.display());
        info!("  Module: {}", self.module_name);
        info!("  Class: {}", self.class_name);
        info!("  Fuel limit: {:?}", self.runtime.fuel_limit);
    }

    /// Validates configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script.as_os_str().is_empty() {
            return Err(ConfigError::Message("script path cannot be empty".into()));
        }

        if self.module_name.trim().is_empty() {
            return Err(ConfigError::Message("module_name cannot be empty".into()));
        }

        if self.class_name.trim().is_empty() || self.class_name.contains('.') {
            return Err(ConfigError::Message(format!(
                "class_name `{}` must be a non-empty name without dots",
                self.class_name
            )));
        }

        self.runtime
            .validate()
            .map_err(|err| ConfigError::Message(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = HostConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.class_name, "Strategy");
        assert_eq!(config.script, PathBuf::from("scripts/strategy.wat"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
script = "demo/momentum.wat"
module_name = "momentum"

[runtime]
fuel_limit = 5000

[logging]
json = true
"#
        )
        .unwrap();

        let config = HostConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.script, PathBuf::from("demo/momentum.wat"));
        assert_eq!(config.module_name, "momentum");
        assert_eq!(config.class_name, "Strategy");
        assert_eq!(config.runtime.fuel_limit, Some(5000));
        assert_eq!(config.runtime.max_instances, RuntimeConfig::default().max_instances);
        assert!(config.logging.json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = HostConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_runtime_limits_are_rejected() {
        let config = HostConfig {
            runtime: RuntimeConfig {
                fuel_limit: Some(0),
                ..RuntimeConfig::default()
            },
            ..HostConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Message(_))));
    }

    #[test]
    fn test_dotted_class_name_is_rejected() {
        let config = HostConfig {
            class_name: "Strategy.eval".into(),
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
