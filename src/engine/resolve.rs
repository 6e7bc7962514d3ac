//! engine::resolve
//!
//! Value Resolver.
//!
//! Every slot of a phase is resolved from the first source that has a value:
//!
//! 1. the internal context, for `forjj-<key>` options (the command line is
//!    never consulted for them)
//! 2. explicit command-line input
//! 3. the persisted options store
//! 4. the schema default
//!
//! A slot with none of these stays unresolved; if it is required it is
//! reported in [`ResolutionReport::missing`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use super::EngineError;
use crate::core::naming::compose_flag_name;
use crate::core::types::{InstanceName, Phase};
use crate::driver::{DriverInstance, DriverRegistry, Resolution, ResolutionSource};
use crate::store::PersistedOptions;

/// Values given on the command line, by composed flag name.
pub trait ExplicitValues {
    fn explicit_value(&self, flag: &str) -> Option<String>;
}

impl ExplicitValues for BTreeMap<String, String> {
    fn explicit_value(&self, flag: &str) -> Option<String> {
        self.get(flag).cloned()
    }
}

impl ExplicitValues for HashMap<String, String> {
    fn explicit_value(&self, flag: &str) -> Option<String> {
        self.get(flag).cloned()
    }
}

/// Keys forjj knows how to compute.
pub const INTERNAL_KEYS: &[&str] = &[
    "organization",
    "infra",
    "instance-name",
    "source-mount",
    "workspace-mount",
];

/// Workspace facts injected into `forjj-<key>` options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalContext {
    pub organization: String,
    pub infra: String,
    /// The workspace directory.
    pub workspace: PathBuf,
}

impl InternalContext {
    pub fn new(
        organization: impl Into<String>,
        infra: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            organization: organization.into(),
            infra: infra.into(),
            workspace: workspace.into(),
        }
    }

    /// Compute `key` for `instance`. `None` for unknown keys.
    pub fn lookup(&self, key: &str, instance: &DriverInstance) -> Option<String> {
        let value = match key {
            "organization" => self.organization.clone(),
            "infra" => self.infra.clone(),
            "instance-name" => instance.name().to_string(),
            "source-mount" => self
                .workspace
                .join(&self.infra)
                .join("apps")
                .join(instance.driver_type())
                .display()
                .to_string(),
            "workspace-mount" => self.workspace.display().to_string(),
            _ => return None,
        };
        Some(value)
    }
}

/// A non-fatal resolution finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownInternalContextKey {
        instance: InstanceName,
        phase: Phase,
        option: String,
        key: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownInternalContextKey {
                instance,
                phase,
                option,
                key,
            } => write!(
                f,
                "{} ({}): option '{}' asks for unknown internal value '{}'; it is left empty",
                instance, phase, option, key
            ),
        }
    }
}

/// Outcome of resolving one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Slots that received a non-empty value.
    pub resolved: usize,
    /// Composed names of required flags left without a value.
    pub missing: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve every slot of `phase` for every loaded instance.
///
/// # Errors
///
/// `EngineError::InvalidPhase` for `common`, which is only ever resolved
/// through the phases it is replicated into.
pub fn resolve_phase(
    registry: &mut DriverRegistry,
    persisted: &BTreeMap<InstanceName, PersistedOptions>,
    context: &InternalContext,
    input: &dyn ExplicitValues,
    phase: &Phase,
) -> Result<ResolutionReport, EngineError> {
    if *phase == Phase::Common {
        return Err(EngineError::InvalidPhase(
            "common options are resolved through create, update or maintain".to_string(),
        ));
    }

    let mut report = ResolutionReport::default();
    for instance in registry.iter_mut().filter(|i| i.is_loaded()) {
        let computed = internal_values(instance, context, phase, &mut report.diagnostics);
        let saved = persisted.get(instance.name());
        let name = instance.name().clone();

        let Some(slots) = instance.slots_mut(phase) else {
            continue;
        };

        for slot in slots.values_mut() {
            let flag = slot
                .flag
                .clone()
                .unwrap_or_else(|| compose_flag_name(&name, &slot.schema.name));

            let resolution = if let Some(value) = computed.get(&slot.schema.name) {
                if input.explicit_value(&flag).is_some() {
                    tracing::warn!(flag = %flag, "ignoring command-line value for an internal option");
                }
                Some(Resolution {
                    value: value.clone(),
                    source: ResolutionSource::InternalContext {
                        key: slot.schema.internal_key().unwrap_or_default().to_string(),
                    },
                })
            } else if let Some(value) = input.explicit_value(&flag) {
                Some(Resolution {
                    value,
                    source: ResolutionSource::ExplicitInput,
                })
            } else if let Some(saved) = saved.and_then(|s| s.get(&slot.schema.name)) {
                Some(Resolution {
                    value: saved.value.clone(),
                    source: ResolutionSource::PersistedOption,
                })
            } else {
                slot.schema.default.clone().map(|value| Resolution {
                    value,
                    source: ResolutionSource::SchemaDefault,
                })
            };

            match &resolution {
                Some(r) if !r.value.is_empty() => {
                    report.resolved += 1;
                    if slot.schema.secure {
                        tracing::debug!(flag = %flag, source = ?r.source, "resolved (secure)");
                    } else {
                        tracing::debug!(flag = %flag, source = ?r.source, value = %r.value, "resolved");
                    }
                }
                _ if slot.schema.required && slot.schema.internal_key().is_none() => {
                    report.missing.push(flag.clone());
                }
                _ => {}
            }
            slot.resolution = resolution;
        }
    }

    Ok(report)
}

/// Values of the internal options of `instance` in `phase`.
///
/// Unknown keys resolve to an empty value and add a diagnostic.
fn internal_values(
    instance: &DriverInstance,
    context: &InternalContext,
    phase: &Phase,
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for slot in instance.options(phase) {
        let Some(key) = slot.schema.internal_key() else {
            continue;
        };
        let value = context.lookup(key, instance).unwrap_or_else(|| {
            tracing::warn!(
                instance = %instance.name(),
                option = %slot.schema.name,
                key,
                "unknown internal context key"
            );
            diagnostics.push(Diagnostic::UnknownInternalContextKey {
                instance: instance.name().clone(),
                phase: phase.clone(),
                option: slot.schema.name.clone(),
                key: key.to_string(),
            });
            String::new()
        });
        values.insert(slot.schema.name.clone(), value);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::naming::FlagNaming;
    use crate::core::types::DriverIdentity;
    use crate::driver::mock::MemorySchemaSource;
    use crate::engine::namespace;
    use crate::store::PersistedValue;
    use std::collections::BTreeSet;

    const GITHUB: &str = r#"
plugin: github
task_flags:
  common:
    forjj-organization:
    forjj-source-mount:
    forjj-nonsense:
    server:
      default: github.com
  create:
    token:
      required: true
      secure: true
  maintain:
    token:
      secure: true
"#;

    fn git1() -> InstanceName {
        InstanceName::new("git1").unwrap()
    }

    fn context() -> InternalContext {
        InternalContext::new("acme", "acme-infra", "/ws/.forj-workspace")
    }

    fn setup(persisted: &BTreeMap<InstanceName, PersistedOptions>) -> DriverRegistry {
        let source = MemorySchemaSource::new().with_document("upstream", "github", GITHUB);
        let mut registry = DriverRegistry::new();
        registry
            .register(git1(), DriverIdentity::new("upstream", "github"), true)
            .unwrap();
        registry.load_schema(&git1(), &source).unwrap();
        namespace::build(
            &mut registry,
            persisted,
            FlagNaming::Prefixed,
            &BTreeSet::new(),
        )
        .unwrap();
        registry
    }

    fn value(registry: &DriverRegistry, phase: &Phase, option: &str) -> Option<Resolution> {
        registry
            .get(&git1())
            .unwrap()
            .slot(phase, option)
            .unwrap()
            .resolution
            .clone()
    }

    #[test]
    fn explicit_beats_persisted() {
        let mut saved = PersistedOptions::new();
        saved.insert("token".into(), PersistedValue::secure("abc"));
        let persisted = BTreeMap::from([(git1(), saved)]);
        let mut registry = setup(&persisted);

        let input = BTreeMap::from([("git1-token".to_string(), "xyz".to_string())]);
        resolve_phase(&mut registry, &persisted, &context(), &input, &Phase::Create).unwrap();

        let token = value(&registry, &Phase::Create, "token").unwrap();
        assert_eq!(token.value, "xyz");
        assert_eq!(token.source, ResolutionSource::ExplicitInput);
    }

    #[test]
    fn persisted_beats_default() {
        let mut saved = PersistedOptions::new();
        saved.insert("server".into(), PersistedValue::new("ghe.acme.com"));
        let persisted = BTreeMap::from([(git1(), saved)]);
        let mut registry = setup(&persisted);

        resolve_phase(
            &mut registry,
            &persisted,
            &context(),
            &BTreeMap::new(),
            &Phase::Update,
        )
        .unwrap();

        let server = value(&registry, &Phase::Update, "server").unwrap();
        assert_eq!(server.value, "ghe.acme.com");
        assert_eq!(server.source, ResolutionSource::PersistedOption);
    }

    #[test]
    fn internal_context_ignores_command_line() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        let input = BTreeMap::from([(
            "git1-forjj-organization".to_string(),
            "forged".to_string(),
        )]);

        resolve_phase(&mut registry, &persisted, &context(), &input, &Phase::Create).unwrap();

        let org = value(&registry, &Phase::Create, "forjj-organization").unwrap();
        assert_eq!(org.value, "acme");
        assert_eq!(
            org.source,
            ResolutionSource::InternalContext {
                key: "organization".into()
            }
        );
    }

    #[test]
    fn mount_paths() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        resolve_phase(
            &mut registry,
            &persisted,
            &context(),
            &BTreeMap::new(),
            &Phase::Maintain,
        )
        .unwrap();

        let mount = value(&registry, &Phase::Maintain, "forjj-source-mount").unwrap();
        assert_eq!(
            PathBuf::from(mount.value),
            PathBuf::from("/ws/.forj-workspace/acme-infra/apps/upstream")
        );
    }

    #[test]
    fn unknown_key_is_a_diagnostic() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        let report = resolve_phase(
            &mut registry,
            &persisted,
            &context(),
            &BTreeMap::new(),
            &Phase::Update,
        )
        .unwrap();

        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].to_string().contains("nonsense"));
        let nonsense = value(&registry, &Phase::Update, "forjj-nonsense").unwrap();
        assert_eq!(nonsense.value, "");
    }

    #[test]
    fn missing_required_is_reported() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        let report = resolve_phase(
            &mut registry,
            &persisted,
            &context(),
            &BTreeMap::new(),
            &Phase::Create,
        )
        .unwrap();

        assert_eq!(report.missing, vec!["git1-token".to_string()]);
        assert!(value(&registry, &Phase::Create, "token").is_none());
    }

    #[test]
    fn phases_do_not_leak() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        let input = BTreeMap::from([("git1-server".to_string(), "ghe.io".to_string())]);

        resolve_phase(&mut registry, &persisted, &context(), &input, &Phase::Create).unwrap();
        resolve_phase(
            &mut registry,
            &persisted,
            &context(),
            &BTreeMap::new(),
            &Phase::Update,
        )
        .unwrap();

        assert_eq!(
            value(&registry, &Phase::Create, "server").unwrap().value,
            "ghe.io"
        );
        let update = value(&registry, &Phase::Update, "server").unwrap();
        assert_eq!(update.value, "github.com");
        assert_eq!(update.source, ResolutionSource::SchemaDefault);
        assert!(value(&registry, &Phase::Maintain, "server").is_none());
    }

    #[test]
    fn common_phase_is_rejected() {
        let persisted = BTreeMap::new();
        let mut registry = setup(&persisted);
        assert!(matches!(
            resolve_phase(
                &mut registry,
                &persisted,
                &context(),
                &BTreeMap::new(),
                &Phase::Common
            ),
            Err(EngineError::InvalidPhase(_))
        ));
    }
}
