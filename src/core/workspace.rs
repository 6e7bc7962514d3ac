//! core::workspace
//!
//! Workspace state persistence.
//!
//! # Layout
//!
//! A workspace is a directory containing `.forj-workspace/`:
//!
//! ```text
//! <workspace>/.forj-workspace/forjj.toml       # this module
//! <workspace>/.forj-workspace/creds-forjj.yml  # see crate::store
//! ```
//!
//! # State
//!
//! ```toml
//! organization = "acme"
//! infra = "acme-infra"
//! contribs_repo = "/srv/forjj-contribs"
//!
//! [drivers.github]
//! type = "upstream"
//! driver = "github"
//! infra_host = true
//! ```
//!
//! The organization and infra repository name are recorded once. Later
//! requests to change them are refused with a warning, the recorded value
//! wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::atomic::write_atomic;
use crate::core::types::{DriverIdentity, InstanceName};

/// Name of the per-workspace state directory.
pub const WORKSPACE_DIR: &str = ".forj-workspace";

/// State file inside [`WORKSPACE_DIR`].
pub const STATE_FILE: &str = "forjj.toml";

/// Default credentials/options file inside [`WORKSPACE_DIR`].
pub const CREDENTIALS_FILE: &str = "creds-forjj.yml";

/// Errors from workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to read workspace state '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse workspace state '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write workspace state '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize workspace state: {0}")]
    SerializeError(String),

    #[error("no organization defined; use --organization")]
    NoOrganization,

    #[error("driver instance '{0}' is not part of this workspace")]
    UnknownInstance(String),

    #[error("driver instance '{0}' already exists in this workspace")]
    InstanceExists(String),
}

/// A driver instance recorded in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistedInstance {
    #[serde(rename = "type")]
    pub driver_type: String,
    pub driver: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub infra_host: bool,
}

impl PersistedInstance {
    pub fn identity(&self) -> DriverIdentity {
        DriverIdentity::new(&self.driver_type, &self.driver)
    }
}

/// On-disk workspace state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceState {
    pub organization: Option<String>,
    pub infra: Option<String>,
    pub contribs_repo: Option<String>,
    pub drivers: BTreeMap<InstanceName, PersistedInstance>,
}

/// An opened workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    pub state: WorkspaceState,
    existed: bool,
}

impl Workspace {
    /// Open the workspace rooted at `root`.
    ///
    /// A workspace without a state file opens empty; nothing is written
    /// until [`Workspace::save`].
    pub fn open(root: &Path) -> Result<Self, WorkspaceError> {
        let path = Self::state_path_for(root);
        if !path.exists() {
            return Ok(Self {
                root: root.to_path_buf(),
                state: WorkspaceState::default(),
                existed: false,
            });
        }

        let contents = fs::read_to_string(&path).map_err(|e| WorkspaceError::ReadError {
            path: path.clone(),
            source: e,
        })?;
        let state = toml::from_str(&contents).map_err(|e| WorkspaceError::ParseError {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            state,
            existed: true,
        })
    }

    fn state_path_for(root: &Path) -> PathBuf {
        root.join(WORKSPACE_DIR).join(STATE_FILE)
    }

    /// Directory the workspace was opened from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.forj-workspace` directory.
    pub fn dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        Self::state_path_for(&self.root)
    }

    pub fn default_credentials_path(&self) -> PathBuf {
        self.dir().join(CREDENTIALS_FILE)
    }

    /// True when no state file existed at open time.
    pub fn is_new(&self) -> bool {
        !self.existed
    }

    /// Write the state file atomically.
    pub fn save(&self) -> Result<PathBuf, WorkspaceError> {
        let path = self.state_path();
        let contents = toml::to_string_pretty(&self.state)
            .map_err(|e| WorkspaceError::SerializeError(e.to_string()))?;
        write_atomic(&path, contents.as_bytes(), false).map_err(|e| {
            WorkspaceError::WriteError {
                path: path.clone(),
                source: e,
            }
        })?;
        Ok(path)
    }

    /// Settle the organization name.
    ///
    /// The first non-empty name is recorded. A later, different request is
    /// refused and reported through the returned warning.
    pub fn settle_organization(&mut self, requested: Option<&str>) -> Option<String> {
        let requested = requested.filter(|r| !r.is_empty());
        match (&self.state.organization, requested) {
            (None, Some(name)) => {
                self.state.organization = Some(name.to_string());
                None
            }
            (Some(current), Some(name)) if current != name => Some(format!(
                "cannot change the organization name of an existing workspace; keeping '{}'",
                current
            )),
            _ => None,
        }
    }

    /// Settle the infra repository name.
    ///
    /// Defaults to `<organization>-infra`. Once recorded, a different
    /// request is refused and reported through the returned warning.
    pub fn settle_infra(&mut self, requested: Option<&str>) -> Option<String> {
        let requested = requested.filter(|r| !r.is_empty());
        match (&self.state.infra, requested) {
            (Some(current), Some(name)) if current != name => Some(format!(
                "cannot change the infra repository name of an existing workspace; keeping '{}'",
                current
            )),
            (Some(_), _) => None,
            (None, Some(name)) => {
                self.state.infra = Some(name.to_string());
                None
            }
            (None, None) => {
                self.state.infra = self
                    .state
                    .organization
                    .as_ref()
                    .map(|org| format!("{}-infra", org));
                None
            }
        }
    }

    /// The settled organization.
    ///
    /// # Errors
    ///
    /// `WorkspaceError::NoOrganization` when none was recorded or requested.
    pub fn organization(&self) -> Result<&str, WorkspaceError> {
        self.state
            .organization
            .as_deref()
            .ok_or(WorkspaceError::NoOrganization)
    }

    pub fn infra(&self) -> Option<&str> {
        self.state.infra.as_deref()
    }

    /// Record (or update) a driver instance.
    pub fn record_driver(&mut self, name: &InstanceName, identity: &DriverIdentity, infra_host: bool) {
        self.state.drivers.insert(
            name.clone(),
            PersistedInstance {
                driver_type: identity.driver_type.clone(),
                driver: identity.driver.clone(),
                infra_host,
            },
        );
    }

    /// Drop a driver instance from the workspace.
    pub fn remove_driver(&mut self, name: &InstanceName) -> Result<PersistedInstance, WorkspaceError> {
        self.state
            .drivers
            .remove(name)
            .ok_or_else(|| WorkspaceError::UnknownInstance(name.to_string()))
    }

    /// Rename a driver instance, keeping its identity.
    pub fn rename_driver(&mut self, from: &InstanceName, to: &InstanceName) -> Result<(), WorkspaceError> {
        if self.state.drivers.contains_key(to) {
            return Err(WorkspaceError::InstanceExists(to.to_string()));
        }
        let record = self.remove_driver(from)?;
        self.state.drivers.insert(to.clone(), record);
        Ok(())
    }

    /// The instance recorded as infra host, if any.
    pub fn infra_host(&self) -> Option<&InstanceName> {
        self.state
            .drivers
            .iter()
            .find(|(_, record)| record.infra_host)
            .map(|(name, _)| name)
    }
}
