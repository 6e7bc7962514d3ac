//! engine
//!
//! Driver flag composition and resolution.
//!
//! # Architecture
//!
//! [`Engine`] is the one context object that owns the run's state: the
//! driver registry, persisted options, the flag graph and the assembly
//! cache. It goes through two stages:
//!
//! 1. **Setup**: drivers are requested and reconciled with the workspace,
//!    their documents loaded. [`Engine::build_namespace`] ends this stage.
//! 2. **Sealed**: the registry and graph are read-only. Each phase is
//!    resolved from parsed input and assembled into plugin parameters.
//!
//! ```text
//! request/reconcile -> build_namespace -> [parse] -> resolve -> assemble
//! ```
//!
//! # Invariants
//!
//! - Setup operations after sealing fail with `EngineError::Sealed`
//! - Configuration errors (duplicate instances, flag collisions) surface
//!   before any command-line parsing
//! - A driver that fails to load is dropped, never fatal
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use forjj::core::types::{AppSpec, InstanceName, Phase};
//! use forjj::driver::mock::MemorySchemaSource;
//! use forjj::engine::{Engine, InternalContext};
//! use forjj::store::MemoryOptionStore;
//!
//! let source = MemorySchemaSource::new().with_document(
//!     "upstream",
//!     "github",
//!     "plugin: github\ntask_flags:\n  create:\n    token:\n      required: true\n",
//! );
//! let store = MemoryOptionStore::new();
//!
//! let mut engine = Engine::new(InternalContext::new("acme", "acme-infra", "/ws"));
//! engine.request(&"upstream:github:git1".parse::<AppSpec>()?, &store, &source)?;
//! let graph = engine.build_namespace()?;
//! assert!(graph.contains("git1-token"));
//!
//! let input = BTreeMap::from([("git1-token".to_string(), "xyz".to_string())]);
//! engine.resolve(&Phase::Create, &input)?;
//! let parameters = engine.assemble(&InstanceName::new("git1")?, &Phase::Create)?;
//! assert_eq!(parameters["token"], "xyz");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod namespace;
pub mod resolve;

pub use assemble::{Assembler, Parameters};
pub use namespace::{ComposedFlag, FlagGraph, FlagKind, FlagScope, FlagSurface};
pub use resolve::{
    Diagnostic, ExplicitValues, InternalContext, ResolutionReport, INTERNAL_KEYS,
};

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::core::naming::FlagNaming;
use crate::core::types::{AppSpec, DriverIdentity, InstanceName, Phase};
use crate::driver::registry::error_chain;
use crate::driver::{DriverError, DriverRegistry, ResolutionSource, SchemaSource, SkippedInstance};
use crate::store::{OptionStore, PersistedOptions, PersistedValue};

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two different options would be exposed under one name.
    #[error("flag --{flag} of {requested} collides with {existing}")]
    FlagCollision {
        flag: String,
        existing: String,
        requested: String,
    },

    #[error(
        "{instance} ({phase}) is missing required options: {}",
        assemble::render_flags(.flags)
    )]
    UnresolvedRequiredOption {
        instance: InstanceName,
        phase: Phase,
        flags: Vec<String>,
    },

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("the flag namespace is already built; drivers can no longer change")]
    Sealed,

    #[error("the flag namespace has not been built yet")]
    NotSealed,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// The run's single owned context.
#[derive(Debug)]
pub struct Engine {
    registry: DriverRegistry,
    persisted: BTreeMap<InstanceName, PersistedOptions>,
    context: InternalContext,
    naming: FlagNaming,
    reserved: BTreeSet<String>,
    graph: Option<FlagGraph>,
    assembler: Assembler,
    skipped: Vec<SkippedInstance>,
}

impl Engine {
    pub fn new(context: InternalContext) -> Self {
        Self {
            registry: DriverRegistry::new(),
            persisted: BTreeMap::new(),
            context,
            naming: FlagNaming::default(),
            reserved: BTreeSet::new(),
            graph: None,
            assembler: Assembler::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_naming(mut self, naming: FlagNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Names no driver flag may take (the built-in CLI flags).
    pub fn with_reserved_flags<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Register and load an explicitly requested driver.
    ///
    /// A document that cannot be fetched or decoded only drops the driver
    /// (it is listed in [`Engine::skipped`]) and is not fetched again.
    ///
    /// # Errors
    ///
    /// - `EngineError::Sealed` once the namespace is built
    /// - `EngineError::Driver(DuplicateInstance)` if the name is taken by
    ///   another driver
    pub fn request(
        &mut self,
        app: &AppSpec,
        store: &dyn OptionStore,
        source: &dyn SchemaSource,
    ) -> Result<(), EngineError> {
        self.ensure_setup()?;
        if let Some(skipped) = self.skipped_instance(&app.instance) {
            if skipped.identity != app.identity {
                return Err(DriverError::DuplicateInstance {
                    name: app.instance.clone(),
                    existing: skipped.identity.clone(),
                    requested: app.identity.clone(),
                }
                .into());
            }
            return Ok(());
        }
        self.registry
            .register(app.instance.clone(), app.identity.clone(), true)?;

        match self.registry.load_schema(&app.instance, source) {
            Ok(()) => self.load_persisted(&app.instance, store),
            Err(error) => {
                tracing::warn!(
                    instance = %app.instance,
                    error = %error_chain(&error),
                    "driver unavailable for this run"
                );
                self.registry.remove(&app.instance);
                self.skipped.push(SkippedInstance {
                    name: app.instance.clone(),
                    identity: app.identity.clone(),
                    error,
                });
            }
        }
        Ok(())
    }

    /// Add the drivers recorded in the workspace.
    ///
    /// # Errors
    ///
    /// `EngineError::Sealed` once the namespace is built.
    pub fn reconcile<I>(
        &mut self,
        recorded: I,
        store: &dyn OptionStore,
        source: &dyn SchemaSource,
    ) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (InstanceName, DriverIdentity)>,
    {
        self.ensure_setup()?;
        let recorded: Vec<_> = recorded
            .into_iter()
            .filter(|(name, _)| self.skipped_instance(name).is_none())
            .collect();
        let skipped = self.registry.reconcile_with_persisted(recorded, source);
        self.skipped.extend(skipped);

        let names: Vec<InstanceName> = self.registry.iter().map(|i| i.name().clone()).collect();
        for name in names {
            if !self.persisted.contains_key(&name) {
                self.load_persisted(&name, store);
            }
        }
        Ok(())
    }

    /// Pick the infra host.
    ///
    /// # Errors
    ///
    /// - `EngineError::Sealed` once the namespace is built
    /// - `EngineError::Driver(InfraHostConflict)` if another instance
    ///   already claimed it
    pub fn settle_infra_host(
        &mut self,
        recorded: Option<&InstanceName>,
    ) -> Result<Option<InstanceName>, EngineError> {
        self.ensure_setup()?;
        Ok(self.registry.settle_infra_host(recorded)?)
    }

    /// Build the flag namespace and seal the engine.
    ///
    /// # Errors
    ///
    /// - `EngineError::Sealed` if it was already built
    /// - `EngineError::FlagCollision` on the first name clash
    pub fn build_namespace(&mut self) -> Result<&FlagGraph, EngineError> {
        self.ensure_setup()?;
        let graph = namespace::build(
            &mut self.registry,
            &self.persisted,
            self.naming,
            &self.reserved,
        )?;
        tracing::info!(
            drivers = self.registry.len(),
            flags = graph.len(),
            "flag namespace ready"
        );
        Ok(self.graph.insert(graph))
    }

    /// Resolve every option of `phase` from `input`.
    ///
    /// Previously assembled parameters of the phase are discarded.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotSealed` before [`Engine::build_namespace`]
    /// - `EngineError::InvalidPhase` for `common`
    pub fn resolve(
        &mut self,
        phase: &Phase,
        input: &dyn ExplicitValues,
    ) -> Result<ResolutionReport, EngineError> {
        if self.graph.is_none() {
            return Err(EngineError::NotSealed);
        }
        let report = resolve::resolve_phase(
            &mut self.registry,
            &self.persisted,
            &self.context,
            input,
            phase,
        )?;
        self.assembler.invalidate(phase);
        tracing::debug!(
            phase = %phase,
            resolved = report.resolved,
            missing = report.missing.len(),
            "phase resolved"
        );
        Ok(report)
    }

    /// Parameters of one instance for one phase.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotSealed` before [`Engine::build_namespace`]
    /// - `EngineError::Driver(UnknownInstance)` for an unknown instance
    /// - `EngineError::UnresolvedRequiredOption` if a required option has
    ///   no value
    pub fn assemble(
        &mut self,
        instance: &InstanceName,
        phase: &Phase,
    ) -> Result<Parameters, EngineError> {
        if self.graph.is_none() {
            return Err(EngineError::NotSealed);
        }
        let driver = self
            .registry
            .get(instance)
            .ok_or_else(|| DriverError::UnknownInstance(instance.to_string()))?;
        self.assembler.assemble(driver, phase)
    }

    /// Values of `instance` given on the command line in `phase`, ready to
    /// be saved in the option store. Internal options are never included.
    pub fn explicit_values(&self, instance: &InstanceName, phase: &Phase) -> PersistedOptions {
        let Some(driver) = self.registry.get(instance) else {
            return PersistedOptions::new();
        };
        driver
            .options(phase)
            .filter(|slot| slot.schema.internal_key().is_none())
            .filter_map(|slot| {
                let resolution = slot.resolution.as_ref()?;
                (resolution.source == ResolutionSource::ExplicitInput).then(|| {
                    let value = PersistedValue {
                        value: resolution.value.clone(),
                        secure: driver.is_secure(&slot.schema.name),
                    };
                    (slot.schema.name.clone(), value)
                })
            })
            .collect()
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn graph(&self) -> Option<&FlagGraph> {
        self.graph.as_ref()
    }

    pub fn is_sealed(&self) -> bool {
        self.graph.is_some()
    }

    pub fn context(&self) -> &InternalContext {
        &self.context
    }

    /// Drivers dropped because they could not be loaded.
    pub fn skipped(&self) -> &[SkippedInstance] {
        &self.skipped
    }

    pub fn persisted(&self, instance: &InstanceName) -> Option<&PersistedOptions> {
        self.persisted.get(instance)
    }

    fn ensure_setup(&self) -> Result<(), EngineError> {
        if self.graph.is_some() {
            return Err(EngineError::Sealed);
        }
        Ok(())
    }

    fn skipped_instance(&self, name: &InstanceName) -> Option<&SkippedInstance> {
        self.skipped.iter().find(|skipped| &skipped.name == name)
    }

    fn load_persisted(&mut self, instance: &InstanceName, store: &dyn OptionStore) {
        let options = store.load(instance).unwrap_or_else(|e| {
            tracing::warn!(instance = %instance, error = %e, "cannot load saved options");
            PersistedOptions::new()
        });
        self.persisted.insert(instance.clone(), options);
    }
}
