//! Configuration System using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration, optional)
//! 2. Environment variables (prefixed with `CYTOGATE_`, `__` separating nested keys)
//!
//! Every field has a default, so an empty or missing file yields a usable configuration.
//!
//! # Example
//! ```no_run
//! use cytogate::config::AppConfig;
//!
//! let config = AppConfig::load_from("cytogate.toml")?;
//! println!("Log level: {}", config.logging.level);
//! # Ok::<(), cytogate::error::CytoError>(())
//! ```

use crate::error::{AppResult, CytoError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "CYTOGATE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Compensation settings
    #[serde(default)]
    pub compensation: CompensationConfig,
    /// Batch mapping discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Compensation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationConfig {
    /// Substrings identifying scatter and time channels, which are never compensated
    #[serde(default = "default_scatter_patterns")]
    pub scatter_patterns: Vec<String>,
}

/// Batch mapping discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum number of files parsed at once (0 = available parallelism)
    #[serde(default)]
    pub max_concurrency: usize,
    /// Skip files whose name contains "comp"
    #[serde(default = "default_exclude_comps")]
    pub exclude_comps: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_scatter_patterns() -> Vec<String> {
    crate::fcs::compensation::DEFAULT_SCATTER_PATTERNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_comps() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for CompensationConfig {
    fn default() -> Self {
        Self {
            scatter_patterns: default_scatter_patterns(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            exclude_comps: default_exclude_comps(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults and environment variables only
    pub fn load() -> AppResult<Self> {
        Self::figment(None).extract().map_err(CytoError::from)
    }

    /// Load configuration from a specific file path, then environment variables
    ///
    /// A missing file is not an error; defaults apply.
    /// Example override: `CYTOGATE_LOGGING__LEVEL=debug`
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(Some(path.as_ref()))
            .extract()
            .map_err(CytoError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(CytoError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(CytoError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        if self
            .compensation
            .scatter_patterns
            .iter()
            .any(|p| crate::validation::is_not_empty(p).is_err())
        {
            return Err(CytoError::Configuration(
                "Scatter patterns cannot be empty strings".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective number of concurrent discovery workers
    pub fn discovery_workers(&self) -> usize {
        if self.discovery.max_concurrency > 0 {
            self.discovery.max_concurrency
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "info");
        assert!(config.discovery.exclude_comps);
        assert_eq!(
            config.compensation.scatter_patterns,
            vec!["FSC", "SSC", "Time", "FS", "SS"]
        );
    }

    #[test]
    #[serial]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[logging]\nlevel = \"debug\"\n\n[discovery]\nmax_concurrency = 3\n"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.discovery_workers(), 3);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\n").unwrap();

        std::env::set_var("CYTOGATE_LOGGING__LEVEL", "warn");
        std::env::set_var("CYTOGATE_DISCOVERY__EXCLUDE_COMPS", "false");
        let config = AppConfig::load_from(file.path());
        std::env::remove_var("CYTOGATE_LOGGING__LEVEL");
        std::env::remove_var("CYTOGATE_DISCOVERY__EXCLUDE_COMPS");

        let config = config.unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(!config.discovery.exclude_comps);
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/cytogate.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.compensation.scatter_patterns.push(String::new());
        assert!(config.validate().is_err());
    }
}
