//! store::traits
//!
//! The persisted options collaborator.
//!
//! # Security
//!
//! Values flagged `secure` are credentials. Implementations must never log
//! them or put them in error messages; [`PersistedValue`]'s `Debug` output
//! redacts them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::InstanceName;

/// Errors from option store operations.
///
/// Messages never include stored values.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read options file '{path}': {message}")]
    ReadError { path: PathBuf, message: String },

    #[error("failed to parse options file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write options file '{path}': {message}")]
    WriteError { path: PathBuf, message: String },

    #[error("failed to serialize options: {0}")]
    SerializeError(String),

    #[error("option store is unavailable: {0}")]
    Unavailable(String),
}

/// One previously saved option value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub secure: bool,
}

impl PersistedValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secure: false,
        }
    }

    pub fn secure(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secure: true,
        }
    }
}

impl fmt::Debug for PersistedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &dyn fmt::Debug = if self.secure { &"<redacted>" } else { &self.value };
        f.debug_struct("PersistedValue")
            .field("value", value)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Saved options of one instance, keyed by option name.
pub type PersistedOptions = BTreeMap<String, PersistedValue>;

/// Trait for persisted option stores.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait OptionStore: Send + Sync {
    /// Saved options of `instance`.
    ///
    /// An instance without a record yields an empty map, not an error.
    fn load(&self, instance: &InstanceName) -> Result<PersistedOptions, StoreError>;

    /// Merge `options` into the record of `instance`.
    ///
    /// Existing options not named in `options` are kept.
    fn save(&self, instance: &InstanceName, options: &PersistedOptions) -> Result<(), StoreError>;

    /// Drop the record of `instance`. Idempotent.
    fn remove(&self, instance: &InstanceName) -> Result<(), StoreError>;

    /// Move the record of `from` to `to`.
    fn rename(&self, from: &InstanceName, to: &InstanceName) -> Result<(), StoreError> {
        let options = self.load(from)?;
        if !options.is_empty() {
            self.save(to, &options)?;
        }
        self.remove(from)
    }
}
