//! core::config
//!
//! Global configuration schema and loading.
//!
//! # Precedence
//!
//! Settings are resolved in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config file
//! 3. Workspace state (see [`crate::core::workspace`])
//! 4. CLI flags and environment (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$FORJJ_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/forjj/config.toml`
//! 3. `~/.forjj/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use forjj::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Plugins from: {}", config.contribs_repo());
//! ```

pub mod schema;

pub use schema::GlobalConfig;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::naming::FlagNaming;

/// Where plugin documents come from when nothing else says otherwise.
pub const DEFAULT_CONTRIBS_REPO: &str = "https://github.com/forj-oss/forjj-contribs/raw/master";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded global configuration.
///
/// Accessors apply built-in defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds invalid values. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::locate() else {
            return Ok(Self::default());
        };

        let global = Self::read(&path)?;
        global.validate()?;

        Ok(Self {
            global,
            path: Some(path),
        })
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global = Self::read(path)?;
        global.validate()?;
        Ok(Self {
            global,
            path: Some(path.to_path_buf()),
        })
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FORJJ_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("forjj/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".forjj/config.toml"))
            .filter(|path| path.exists())
    }

    fn read(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Schema source location.
    ///
    /// Defaults to [`DEFAULT_CONTRIBS_REPO`].
    pub fn contribs_repo(&self) -> &str {
        self.global
            .contribs_repo
            .as_deref()
            .unwrap_or(DEFAULT_CONTRIBS_REPO)
    }

    /// Flag naming policy.
    ///
    /// Defaults to [`FlagNaming::Prefixed`].
    pub fn flag_naming(&self) -> FlagNaming {
        self.global.flag_naming.unwrap_or_default()
    }

    /// Configured credentials file, if any.
    pub fn credentials_file(&self) -> Option<&Path> {
        self.global.credentials_file.as_deref()
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
