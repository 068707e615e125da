//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Locate the configuration file on the search path
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Produce a `CollectorConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("config.toml")).unwrap();
//! println!("workers: {}", config.controller.workers);
//! ```

mod parser;
mod validator;

pub use contracts::CollectorConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::{Path, PathBuf};

/// Directory name used under `/etc` and `$HOME/.config`
pub const APP_DIR: &str = "loki-event-collector";

/// Base file name looked up in each search directory
pub const CONFIG_STEM: &str = "config";

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<CollectorConfig, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load the explicit file if given, otherwise the first file found on
    /// the search path
    ///
    /// Returns the loaded configuration together with the path it came from.
    pub fn load(explicit: Option<&Path>) -> Result<(CollectorConfig, PathBuf), ContractError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::discover(&Self::search_dirs())?,
        };
        let config = Self::load_from_path(&path)?;
        Ok((config, path))
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CollectorConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize CollectorConfig to TOML string
    pub fn to_toml(config: &CollectorConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize CollectorConfig to JSON string
    pub fn to_json(config: &CollectorConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Default search directories, highest priority first:
    /// `.`, `/etc/loki-event-collector`, `$HOME/.config/loki-event-collector`
    pub fn search_dirs() -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from("."), Path::new("/etc").join(APP_DIR)];
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join(".config").join(APP_DIR));
        }
        dirs
    }

    /// First `config.toml` / `config.json` found in `dirs`
    pub fn discover(dirs: &[PathBuf]) -> Result<PathBuf, ContractError> {
        let mut searched = Vec::new();
        for dir in dirs {
            for format in [ConfigFormat::Toml, ConfigFormat::Json] {
                let candidate = dir.join(format!("{CONFIG_STEM}.{}", format.extension()));
                if candidate.is_file() {
                    return Ok(candidate);
                }
                searched.push(candidate.display().to_string());
            }
        }
        Err(ContractError::ConfigNotFound { searched })
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CollectorConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
