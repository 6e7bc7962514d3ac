//! driver::registry
//!
//! The authoritative set of driver instances for one run.
//!
//! # Invariants
//!
//! - Instance names are unique; re-registering the same identity is a no-op
//! - A schema document is fetched and decoded at most once per instance
//! - At most one instance is the infra host
//! - Persisted instances that fail to load are dropped, never fatal

use std::collections::BTreeMap;

use thiserror::Error;

use super::instance::{DriverInstance, LoadState};
use super::schema::{PluginSchema, SchemaError};
use super::source::{SchemaSource, SourceError};
use crate::core::types::{DriverIdentity, InstanceName};

/// Registry errors.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("instance '{name}' is already registered as {existing}, cannot register it as {requested}")]
    DuplicateInstance {
        name: InstanceName,
        existing: DriverIdentity,
        requested: DriverIdentity,
    },

    #[error("cannot fetch the plugin document of '{instance}'")]
    SchemaFetch {
        instance: InstanceName,
        #[source]
        source: SourceError,
    },

    #[error("cannot decode the plugin document of '{instance}'")]
    SchemaDecode {
        instance: InstanceName,
        #[source]
        source: SchemaError,
    },

    /// A previous load of this instance failed; it is not retried.
    #[error("plugin document of '{instance}' is unavailable: {reason}")]
    SchemaUnavailable { instance: InstanceName, reason: String },

    #[error("unknown driver instance '{0}'")]
    UnknownInstance(String),

    #[error("'{requested}' cannot be the infra host, '{current}' already is")]
    InfraHostConflict {
        current: InstanceName,
        requested: InstanceName,
    },
}

/// A persisted instance that was dropped during reconciliation.
#[derive(Debug)]
pub struct SkippedInstance {
    pub name: InstanceName,
    pub identity: DriverIdentity,
    pub error: DriverError,
}

/// Owns every [`DriverInstance`] of the run, keyed by name.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    instances: BTreeMap<InstanceName, DriverInstance>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance.
    ///
    /// Registering an existing name with the same identity returns the
    /// existing instance; `requested` can only upgrade it to explicitly
    /// requested.
    ///
    /// # Errors
    ///
    /// `DriverError::DuplicateInstance` if the name is taken by another
    /// driver identity.
    pub fn register(
        &mut self,
        name: InstanceName,
        identity: DriverIdentity,
        requested: bool,
    ) -> Result<&mut DriverInstance, DriverError> {
        if let Some(existing) = self.instances.get(&name) {
            if existing.identity() != &identity {
                return Err(DriverError::DuplicateInstance {
                    existing: existing.identity().clone(),
                    name,
                    requested: identity,
                });
            }
        }

        let instance = self.instances.entry(name.clone()).or_insert_with(|| {
            tracing::debug!(instance = %name, driver = %identity, requested, "registering driver instance");
            DriverInstance::new(name, identity, requested)
        });
        if requested {
            instance.set_requested();
        }
        Ok(instance)
    }

    /// Fetch and decode the plugin document of an instance.
    ///
    /// Already loaded instances return immediately without fetching. A
    /// failure is remembered and returned again on later calls.
    ///
    /// # Errors
    ///
    /// - `DriverError::UnknownInstance` if `name` is not registered
    /// - `DriverError::SchemaFetch` if the source cannot deliver the document
    /// - `DriverError::SchemaDecode` if the document is malformed
    /// - `DriverError::SchemaUnavailable` if an earlier load failed
    pub fn load_schema(
        &mut self,
        name: &InstanceName,
        source: &dyn SchemaSource,
    ) -> Result<(), DriverError> {
        let instance = self
            .instances
            .get_mut(name)
            .ok_or_else(|| DriverError::UnknownInstance(name.to_string()))?;

        match instance.load_state() {
            LoadState::Loaded => return Ok(()),
            LoadState::Failed(reason) => {
                return Err(DriverError::SchemaUnavailable {
                    instance: name.clone(),
                    reason: reason.clone(),
                })
            }
            LoadState::Pending => {}
        }

        match fetch_and_decode(instance, source) {
            Ok(()) => Ok(()),
            Err(e) => {
                instance.mark_failed(error_chain(&e));
                Err(e)
            }
        }
    }

    /// Register and load every persisted instance not registered yet.
    ///
    /// Instances that fail to register or load are logged, removed and
    /// returned; the others are unaffected.
    pub fn reconcile_with_persisted<I>(
        &mut self,
        persisted: I,
        source: &dyn SchemaSource,
    ) -> Vec<SkippedInstance>
    where
        I: IntoIterator<Item = (InstanceName, DriverIdentity)>,
    {
        let mut skipped = Vec::new();

        for (name, identity) in persisted {
            if let Some(existing) = self.instances.get(&name) {
                if existing.identity() != &identity {
                    tracing::warn!(
                        instance = %name,
                        recorded = %identity,
                        requested = %existing.identity(),
                        "instance recorded in workspace with another driver; keeping the requested one"
                    );
                }
                continue;
            }

            let registered = self
                .register(name.clone(), identity.clone(), false)
                .map(|_| ());
            let result = registered.and_then(|()| self.load_schema(&name, source));

            if let Err(error) = result {
                tracing::warn!(
                    instance = %name,
                    error = %error_chain(&error),
                    "skipping persisted driver instance"
                );
                self.instances.remove(&name);
                skipped.push(SkippedInstance {
                    name,
                    identity,
                    error,
                });
            }
        }

        skipped
    }

    /// Make `name` the infra host.
    ///
    /// # Errors
    ///
    /// - `DriverError::UnknownInstance` if `name` is not registered
    /// - `DriverError::InfraHostConflict` if another instance already is
    pub fn mark_infra_host(&mut self, name: &InstanceName) -> Result<(), DriverError> {
        if !self.instances.contains_key(name) {
            return Err(DriverError::UnknownInstance(name.to_string()));
        }
        if let Some(current) = self.infra_host() {
            if current.name() != name {
                return Err(DriverError::InfraHostConflict {
                    current: current.name().clone(),
                    requested: name.clone(),
                });
            }
        }
        if let Some(instance) = self.instances.get_mut(name) {
            instance.set_infra_host(true);
        }
        Ok(())
    }

    /// Pick the infra host for this run.
    ///
    /// Uses `recorded` when it is registered, otherwise the first `upstream`
    /// instance by name. Returns the chosen instance, if any.
    pub fn settle_infra_host(
        &mut self,
        recorded: Option<&InstanceName>,
    ) -> Result<Option<InstanceName>, DriverError> {
        if let Some(current) = self.infra_host() {
            return Ok(Some(current.name().clone()));
        }

        let chosen = recorded
            .filter(|name| self.instances.contains_key(*name))
            .cloned()
            .or_else(|| {
                self.instances
                    .values()
                    .find(|i| i.driver_type() == "upstream")
                    .map(|i| i.name().clone())
            });

        if let Some(name) = &chosen {
            self.mark_infra_host(name)?;
            tracing::debug!(instance = %name, "infra host");
        }
        Ok(chosen)
    }

    pub fn infra_host(&self) -> Option<&DriverInstance> {
        self.instances.values().find(|i| i.is_infra_host())
    }

    pub fn get(&self, name: &InstanceName) -> Option<&DriverInstance> {
        self.instances.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &InstanceName) -> Option<&mut DriverInstance> {
        self.instances.get_mut(name)
    }

    pub fn contains(&self, name: &InstanceName) -> bool {
        self.instances.contains_key(name)
    }

    pub(crate) fn remove(&mut self, name: &InstanceName) -> Option<DriverInstance> {
        self.instances.remove(name)
    }

    /// Instances ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &DriverInstance> {
        self.instances.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DriverInstance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn fetch_and_decode(
    instance: &mut DriverInstance,
    source: &dyn SchemaSource,
) -> Result<(), DriverError> {
    let name = instance.name().clone();
    tracing::debug!(
        instance = %name,
        source = %source.location(),
        "loading plugin document"
    );

    let bytes = source
        .fetch(instance.driver_type(), instance.driver())
        .map_err(|source| DriverError::SchemaFetch {
            instance: name.clone(),
            source,
        })?;

    let decode_error = |source| DriverError::SchemaDecode {
        instance: name.clone(),
        source,
    };
    let schema = PluginSchema::decode(&bytes).map_err(decode_error)?;
    let runtime = schema
        .runtime_metadata(&name, instance.driver())
        .map_err(decode_error)?;

    instance.install_schema(&schema, runtime);
    tracing::debug!(
        instance = %name,
        options = schema.options.len(),
        "plugin document loaded"
    );
    Ok(())
}

/// Error message including its sources.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
