//! engine::namespace
//!
//! Flag Namespace Builder.
//!
//! Projects every loaded driver instance onto one [`FlagGraph`]. Each
//! (instance, option) pair gets exactly one composed name; two different
//! pairs never share one.
//!
//! # Ordering
//!
//! Instances are visited by name, phases in declaration order (common,
//! create, update, maintain, custom) and options lexicographically, so the
//! graph and any collision error are the same on every run.
//!
//! # Default/required policy
//!
//! | persisted value | default shown | required |
//! |---|---|---|
//! | yes | the persisted value, unless secure | no |
//! | no | the schema default, unless secure | only without a schema default |

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use super::EngineError;
use crate::core::naming::FlagNaming;
use crate::core::types::{InstanceName, Phase};
use crate::driver::{DriverRegistry, OptionSlot};
use crate::store::PersistedOptions;

/// How a composed flag gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagKind {
    /// Settable from the command line.
    External,
    /// Filled by forjj from the internal context; never exposed.
    Internal { key: String },
}

/// Where a composed flag is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagScope {
    /// Declared in `common`: registered once, active in every concrete phase.
    App,
    /// Active only in these phases.
    Phases(BTreeSet<Phase>),
}

/// The external name of one (instance, option) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedFlag {
    pub name: String,
    pub instance: InstanceName,
    pub option: String,
    pub help: String,
    pub kind: FlagKind,
    pub scope: FlagScope,
    /// Default shown on the command line. Never set for secure options.
    pub default: Option<String>,
    pub required: bool,
    pub secure: bool,
}

impl ComposedFlag {
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, FlagKind::Internal { .. })
    }

    /// True if the flag carries a value in `phase`.
    pub fn active_in(&self, phase: &Phase) -> bool {
        match &self.scope {
            FlagScope::App => phase.is_concrete(),
            FlagScope::Phases(phases) => phases.contains(phase),
        }
    }

    fn owner(&self) -> String {
        format!("{}/{}", self.instance, self.option)
    }
}

impl fmt::Display for ComposedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}", self.name)
    }
}

/// The shared flag namespace, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FlagGraph {
    flags: Vec<ComposedFlag>,
    index: HashMap<String, usize>,
    reserved: BTreeSet<String>,
}

impl FlagGraph {
    /// Create a graph where `reserved` names (built-in CLI flags) are taken.
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: Vec::new(),
            index: HashMap::new(),
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a flag.
    ///
    /// Registering the same (instance, option) pair again widens its scope.
    ///
    /// # Errors
    ///
    /// `EngineError::FlagCollision` if the name is reserved or already used
    /// by another pair.
    pub fn register(&mut self, flag: ComposedFlag) -> Result<(), EngineError> {
        if self.reserved.contains(&flag.name) {
            return Err(EngineError::FlagCollision {
                flag: flag.name.clone(),
                existing: "a built-in flag".to_string(),
                requested: flag.owner(),
            });
        }

        let position = match self.index.get(&flag.name).copied() {
            Some(position) => position,
            None => {
                tracing::debug!(flag = %flag.name, scope = ?flag.scope, "flag registered");
                self.index.insert(flag.name.clone(), self.flags.len());
                self.flags.push(flag);
                return Ok(());
            }
        };

        let existing = &mut self.flags[position];
        if existing.instance != flag.instance || existing.option != flag.option {
            return Err(EngineError::FlagCollision {
                flag: flag.name.clone(),
                existing: existing.owner(),
                requested: flag.owner(),
            });
        }

        let scope = match (existing.scope.clone(), flag.scope) {
            (FlagScope::Phases(mut current), FlagScope::Phases(added)) => {
                current.extend(added);
                FlagScope::Phases(current)
            }
            _ => FlagScope::App,
        };
        existing.scope = scope;
        existing.required = existing.required && flag.required;
        existing.secure = existing.secure || flag.secure;
        if existing.secure || existing.default != flag.default {
            existing.default = None;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComposedFlag> {
        self.index.get(name).map(|&i| &self.flags[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComposedFlag> {
        self.flags.iter()
    }

    /// Flags the command line may set.
    pub fn external(&self) -> impl Iterator<Item = &ComposedFlag> {
        self.flags.iter().filter(|f| !f.is_internal())
    }

    /// Flags carrying a value in `phase`.
    pub fn active_in<'a>(&'a self, phase: &'a Phase) -> impl Iterator<Item = &'a ComposedFlag> {
        self.flags.iter().filter(move |f| f.active_in(phase))
    }

    pub fn for_instance<'a>(
        &'a self,
        instance: &'a InstanceName,
    ) -> impl Iterator<Item = &'a ComposedFlag> {
        self.flags.iter().filter(move |f| &f.instance == instance)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Receives external flags when the graph is projected onto a command line.
pub trait FlagSurface {
    /// A flag available to every lifecycle verb.
    fn add_app_flag(&mut self, flag: &ComposedFlag);

    /// A flag available only to the verbs of `phase`.
    fn add_phase_flag(&mut self, phase: &Phase, flag: &ComposedFlag);
}

/// Register every external flag of `graph` on `surface`.
///
/// Internal flags are skipped. Custom phases have no verb and are skipped
/// too.
pub fn project(graph: &FlagGraph, surface: &mut dyn FlagSurface) {
    for flag in graph.external() {
        match &flag.scope {
            FlagScope::App => surface.add_app_flag(flag),
            FlagScope::Phases(phases) => {
                for phase in phases {
                    if phase.is_concrete() {
                        surface.add_phase_flag(phase, flag);
                    } else {
                        tracing::debug!(flag = %flag.name, phase = %phase, "no verb for phase; flag not exposed");
                    }
                }
            }
        }
    }
}

/// Build the namespace from every loaded instance of `registry`.
///
/// Common slots are replicated into each concrete phase and every slot
/// learns its composed flag name.
///
/// # Errors
///
/// `EngineError::FlagCollision` on the first name clash.
pub fn build(
    registry: &mut DriverRegistry,
    persisted: &BTreeMap<InstanceName, PersistedOptions>,
    naming: FlagNaming,
    reserved: &BTreeSet<String>,
) -> Result<FlagGraph, EngineError> {
    let mut graph = FlagGraph::new(reserved.iter().cloned());
    let declared_by = declaring_instances(registry);

    for instance in registry.iter_mut() {
        if !instance.is_loaded() {
            continue;
        }
        instance.replicate_common();

        let name = instance.name().clone();
        let saved = persisted.get(&name);
        let mut assigned = Vec::new();

        for (phase, slot) in instance.declared() {
            let flag = compose(&name, phase, slot, saved, naming, &declared_by, reserved);
            assigned.push((phase.clone(), slot.schema.name.clone(), flag.name.clone()));
            graph.register(flag)?;
        }

        for (phase, option, flag) in assigned {
            instance.assign_flag(&phase, &option, &flag);
        }
    }

    tracing::debug!(flags = graph.len(), "flag namespace built");
    Ok(graph)
}

fn compose(
    instance: &InstanceName,
    phase: &Phase,
    slot: &OptionSlot,
    saved: Option<&PersistedOptions>,
    naming: FlagNaming,
    declared_by: &HashMap<String, usize>,
    reserved: &BTreeSet<String>,
) -> ComposedFlag {
    let schema = &slot.schema;
    let scope = match phase {
        Phase::Common => FlagScope::App,
        other => FlagScope::Phases(BTreeSet::from([other.clone()])),
    };

    if let Some(key) = schema.internal_key() {
        return ComposedFlag {
            name: naming.name(instance, &schema.name, false),
            instance: instance.clone(),
            option: schema.name.clone(),
            help: schema.help.clone(),
            kind: FlagKind::Internal {
                key: key.to_string(),
            },
            scope,
            default: None,
            required: false,
            secure: schema.secure,
        };
    }

    let unique = declared_by.get(&schema.name) == Some(&1)
        && !reserved.contains(&schema.name);
    let persisted = saved
        .and_then(|s| s.get(&schema.name))
        .filter(|p| !p.value.is_empty());
    let secure = schema.secure || persisted.is_some_and(|p| p.secure);

    let (default, required) = match persisted {
        Some(value) if !secure => (Some(value.value.clone()), false),
        Some(_) => (None, false),
        None => (
            schema.visible_default().map(str::to_string),
            schema.required && schema.default.is_none(),
        ),
    };

    ComposedFlag {
        name: naming.name(instance, &schema.name, unique),
        instance: instance.clone(),
        option: schema.name.clone(),
        help: schema.help.clone(),
        kind: FlagKind::External,
        scope,
        default,
        required,
        secure,
    }
}

/// How many loaded instances declare each external option name.
fn declaring_instances(registry: &DriverRegistry) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for instance in registry.iter().filter(|i| i.is_loaded()) {
        let names: BTreeSet<&str> = instance
            .declared()
            .filter(|(_, slot)| slot.schema.internal_key().is_none())
            .map(|(_, slot)| slot.schema.name.as_str())
            .collect();
        for name in names {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}
