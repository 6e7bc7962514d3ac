//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$FORJJ_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/forjj/config.toml`
//! 3. `~/.forjj/config.toml`
//!
//! # Validation
//!
//! Config values are validated after parsing so that a bad schema-source
//! location is reported before any plugin is fetched.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::naming::FlagNaming;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// contribs_repo = "https://github.com/forj-oss/forjj-contribs/raw/master"
/// flag_naming = "prefixed"
/// credentials_file = "/home/me/.forjj/creds.yml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Where plugin documents are fetched from (URL or directory)
    pub contribs_repo: Option<String>,

    /// How driver options are named on the command line
    pub flag_naming: Option<FlagNaming>,

    /// Default credentials/options file
    pub credentials_file: Option<PathBuf>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(repo) = &self.contribs_repo {
            if repo.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "contribs_repo cannot be empty".to_string(),
                ));
            }
        }

        if let Some(path) = &self.credentials_file {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "credentials_file cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
