//! driver::instance
//!
//! One configured plugin and its per-phase option slots.
//!
//! # Lifecycle
//!
//! An instance is created by the registry (explicitly requested or found in
//! the workspace), populated once by loading its plugin document, and from
//! then on only its slot resolutions change. Slots are mutated by the engine
//! alone.

use std::collections::BTreeMap;

use serde::Serialize;

use super::schema::{OptionSchema, PluginSchema, RuntimeMetadata};
use crate::core::types::{DriverIdentity, InstanceName, Phase};

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum ResolutionSource {
    /// Parsed from the command line.
    ExplicitInput,
    /// Loaded from the options/credentials store.
    PersistedOption,
    /// Computed by forjj for a reserved `forjj-<key>` option.
    InternalContext { key: String },
    /// The plugin's declared default.
    SchemaDefault,
}

/// The final value of one option slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    pub source: ResolutionSource,
}

/// Resolved-value slot of one option in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSlot {
    /// `schema.phase` is the declaring phase; `common` for replicas.
    pub schema: OptionSchema,
    /// Composed flag name, assigned when the namespace is built.
    pub flag: Option<String>,
    pub resolution: Option<Resolution>,
}

impl OptionSlot {
    fn new(schema: OptionSchema) -> Self {
        Self {
            schema,
            flag: None,
            resolution: None,
        }
    }

    /// Non-empty resolved value.
    pub fn value(&self) -> Option<&str> {
        self.resolution
            .as_ref()
            .map(|r| r.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// True when the slot was copied from the common phase.
    pub fn is_common(&self) -> bool {
        self.schema.phase == Phase::Common
    }
}

/// Schema loading progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed(String),
}

/// One configured plugin.
#[derive(Debug, Clone)]
pub struct DriverInstance {
    name: InstanceName,
    identity: DriverIdentity,
    requested: bool,
    infra_host: bool,
    state: LoadState,
    options: BTreeMap<Phase, BTreeMap<String, OptionSlot>>,
    runtime: Option<RuntimeMetadata>,
}

impl DriverInstance {
    pub(crate) fn new(name: InstanceName, identity: DriverIdentity, requested: bool) -> Self {
        Self {
            name,
            identity,
            requested,
            infra_host: false,
            state: LoadState::Pending,
            options: BTreeMap::new(),
            runtime: None,
        }
    }

    pub fn name(&self) -> &InstanceName {
        &self.name
    }

    pub fn identity(&self) -> &DriverIdentity {
        &self.identity
    }

    pub fn driver_type(&self) -> &str {
        &self.identity.driver_type
    }

    pub fn driver(&self) -> &str {
        &self.identity.driver
    }

    /// True when the invocation asked for this instance (e.g. `--apps`).
    pub fn requested_explicitly(&self) -> bool {
        self.requested
    }

    pub fn is_infra_host(&self) -> bool {
        self.infra_host
    }

    pub fn load_state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// Runtime metadata, present once the schema is loaded.
    pub fn runtime(&self) -> Option<&RuntimeMetadata> {
        self.runtime.as_ref()
    }

    /// Phases with at least a (possibly empty) slot map.
    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.options.keys()
    }

    /// Slots of one phase, ordered by option name.
    pub fn options(&self, phase: &Phase) -> impl Iterator<Item = &OptionSlot> {
        self.options.get(phase).into_iter().flat_map(|m| m.values())
    }

    pub fn slot(&self, phase: &Phase, option: &str) -> Option<&OptionSlot> {
        self.options.get(phase).and_then(|m| m.get(option))
    }

    /// Slots declared directly in their own phase (no replicas).
    pub fn declared(&self) -> impl Iterator<Item = (&Phase, &OptionSlot)> {
        self.options.iter().flat_map(|(phase, slots)| {
            slots
                .values()
                .filter(move |slot| &slot.schema.phase == phase)
                .map(move |slot| (phase, slot))
        })
    }

    /// True if any declaration of `option` is secure.
    pub fn is_secure(&self, option: &str) -> bool {
        self.options
            .values()
            .filter_map(|m| m.get(option))
            .any(|slot| slot.schema.secure)
    }

    pub(crate) fn set_requested(&mut self) {
        self.requested = true;
    }

    pub(crate) fn set_infra_host(&mut self, infra_host: bool) {
        self.infra_host = infra_host;
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.state = LoadState::Failed(reason.into());
    }

    /// Populate slots from a decoded document.
    ///
    /// Every known phase gets a slot map, empty when the plugin declares
    /// nothing for it.
    pub(crate) fn install_schema(&mut self, schema: &PluginSchema, runtime: RuntimeMetadata) {
        let mut options: BTreeMap<Phase, BTreeMap<String, OptionSlot>> = BTreeMap::new();
        options.insert(Phase::Common, BTreeMap::new());
        for phase in Phase::concrete() {
            options.insert(phase, BTreeMap::new());
        }

        for option in &schema.options {
            options
                .entry(option.phase.clone())
                .or_default()
                .insert(option.name.clone(), OptionSlot::new(option.clone()));
        }

        self.options = options;
        self.runtime = Some(runtime);
        self.state = LoadState::Loaded;
    }

    /// Copy common slots into every concrete phase.
    ///
    /// A phase-specific declaration of the same option is kept as is.
    pub(crate) fn replicate_common(&mut self) {
        let common: Vec<OptionSlot> = self.options(&Phase::Common).cloned().collect();
        for phase in Phase::concrete() {
            let slots = self.options.entry(phase).or_default();
            for slot in &common {
                slots
                    .entry(slot.schema.name.clone())
                    .or_insert_with(|| slot.clone());
            }
        }
    }

    pub(crate) fn slots_mut(&mut self, phase: &Phase) -> Option<&mut BTreeMap<String, OptionSlot>> {
        self.options.get_mut(phase)
    }

    /// Assign the composed flag name to every slot of `option` that was
    /// declared in (or replicated from) `declared_in`.
    pub(crate) fn assign_flag(&mut self, declared_in: &Phase, option: &str, flag: &str) {
        for slots in self.options.values_mut() {
            if let Some(slot) = slots.get_mut(option) {
                if &slot.schema.phase == declared_in {
                    slot.flag = Some(flag.to_string());
                }
            }
        }
    }
}
