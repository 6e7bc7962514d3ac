//! store::file_store
//!
//! YAML credentials/options file.
//!
//! # Format
//!
//! ```yaml
//! drivers:
//!   github:
//!     server:
//!       value: github.com
//!     token:
//!       value: ghp_xxxx
//!       secure: true
//! ```
//!
//! # Security
//!
//! - The file is written atomically with 0600 permissions on Unix
//! - Values are never logged or included in error messages

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::traits::{OptionStore, PersistedOptions, StoreError};
use crate::core::atomic::write_atomic;
use crate::core::types::InstanceName;

#[derive(Debug, Default, Serialize, Deserialize)]
struct OptionsFile {
    #[serde(default)]
    drivers: BTreeMap<String, PersistedOptions>,
}

/// File-based option store.
#[derive(Debug, Clone)]
pub struct FileOptionStore {
    path: PathBuf,
}

impl FileOptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<OptionsFile, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(OptionsFile::default()),
            Err(e) => {
                return Err(StoreError::ReadError {
                    path: self.path.clone(),
                    message: e.to_string(),
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(OptionsFile::default());
        }

        serde_yaml::from_str(&content).map_err(|e| StoreError::ParseError {
            path: self.path.clone(),
            // serde_yaml locations only; the offending text is not echoed.
            message: e
                .location()
                .map(|l| format!("invalid document at line {}, column {}", l.line(), l.column()))
                .unwrap_or_else(|| "invalid document".to_string()),
        })
    }

    fn write_file(&self, file: &OptionsFile) -> Result<(), StoreError> {
        let content =
            serde_yaml::to_string(file).map_err(|e| StoreError::SerializeError(e.to_string()))?;
        write_atomic(&self.path, content.as_bytes(), true).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    /// Verify file permissions are 0600 (Unix only).
    ///
    /// Returns true if the file does not exist.
    #[cfg(unix)]
    pub fn verify_permissions(&self) -> Result<bool, StoreError> {
        use std::os::unix::fs::PermissionsExt;

        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.permissions().mode() & 0o777 == 0o600),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(StoreError::ReadError {
                path: self.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    pub fn verify_permissions(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

impl OptionStore for FileOptionStore {
    fn load(&self, instance: &InstanceName) -> Result<PersistedOptions, StoreError> {
        let mut file = self.read_file()?;
        Ok(file.drivers.remove(instance.as_str()).unwrap_or_default())
    }

    fn save(&self, instance: &InstanceName, options: &PersistedOptions) -> Result<(), StoreError> {
        let mut file = self.read_file()?;
        let record = file.drivers.entry(instance.to_string()).or_default();
        for (name, value) in options {
            record.insert(name.clone(), value.clone());
        }
        self.write_file(&file)?;
        tracing::debug!(instance = %instance, count = options.len(), path = %self.path.display(), "options saved");
        Ok(())
    }

    fn remove(&self, instance: &InstanceName) -> Result<(), StoreError> {
        let mut file = self.read_file()?;
        if file.drivers.remove(instance.as_str()).is_some() {
            self.write_file(&file)?;
        }
        Ok(())
    }
}
