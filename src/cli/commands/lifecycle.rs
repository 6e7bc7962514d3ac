//! Lifecycle verbs: create, update, add, remove, rename, maintain.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use crate::cli::session::Session;
use crate::core::types::{AppSpec, InstanceName, Phase};
use crate::core::workspace::WorkspaceError;
use crate::engine::EngineError;
use crate::invoke::{Invocation, Invoker};
use crate::ui::output;

/// Resolve, assemble and invoke `phase` for every driver, then persist.
///
/// Nothing is invoked unless every driver has all its required values;
/// the error then lists each missing flag. After a successful run the
/// explicit values are merged into the option store and the workspace
/// state is saved.
pub fn run_phase(
    session: &mut Session,
    phase: &Phase,
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
) -> Result<()> {
    session.engine.resolve(phase, input)?;

    let names: Vec<InstanceName> = session
        .engine
        .registry()
        .iter()
        .map(|instance| instance.name().clone())
        .collect();

    let mut planned = Vec::with_capacity(names.len());
    let mut problems = Vec::new();
    for name in names {
        match session.engine.assemble(&name, phase) {
            Ok(parameters) => planned.push((name, parameters)),
            Err(e @ EngineError::UnresolvedRequiredOption { .. }) => problems.push(e.to_string()),
            Err(e) => return Err(e.into()),
        }
    }
    if !problems.is_empty() {
        bail!(
            "cannot run {}:\n{}",
            phase,
            output::format_list(&problems, "  ")
        );
    }

    for (name, parameters) in &planned {
        let Some(instance) = session.engine.registry().get(name) else {
            continue;
        };
        invoker
            .invoke(&Invocation {
                instance,
                phase,
                parameters,
            })
            .with_context(|| format!("{} failed during {}", name, phase))?;
    }

    for (name, _) in &planned {
        let explicit = session.engine.explicit_values(name, phase);
        if !explicit.is_empty() {
            session
                .store
                .save(name, &explicit)
                .with_context(|| format!("Failed to save options of '{}'", name))?;
        }
    }

    for instance in session.engine.registry().iter() {
        session
            .workspace
            .record_driver(instance.name(), instance.identity(), instance.is_infra_host());
    }
    let path = session
        .workspace
        .save()
        .context("Failed to save workspace state")?;

    tracing::info!(
        phase = %phase,
        drivers = planned.len(),
        state = %path.display(),
        "phase complete"
    );
    Ok(())
}

/// Create a workspace, then maintain it unless `no_maintain`.
pub fn create(
    session: &mut Session,
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
    no_maintain: bool,
) -> Result<()> {
    if !session.workspace.is_new() {
        bail!(
            "'{}' is already a workspace; use 'forjj update' to change it",
            session.workspace.root().display()
        );
    }
    session.workspace.organization()?;
    if session.engine.registry().is_empty() {
        output::warn("no drivers to create; use --apps", session.verbosity);
    }

    run_phase(session, &Phase::Create, input, invoker)?;
    if !no_maintain {
        run_phase(session, &Phase::Maintain, input, invoker)?;
    }
    Ok(())
}

pub fn update(
    session: &mut Session,
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
) -> Result<()> {
    require_workspace(session)?;
    run_phase(session, &Phase::Update, input, invoker)
}

/// Add the `apps` instances to the workspace and update.
pub fn add(
    session: &mut Session,
    apps: &[AppSpec],
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
) -> Result<()> {
    require_workspace(session)?;
    if apps.is_empty() {
        bail!("nothing to add; use --apps type:driver[:instance]");
    }
    if let Some(app) = apps
        .iter()
        .find(|app| session.workspace.state.drivers.contains_key(&app.instance))
    {
        return Err(WorkspaceError::InstanceExists(app.instance.to_string()).into());
    }

    run_phase(session, &Phase::Update, input, invoker)
}

/// Drop instances from the workspace and their saved options.
pub fn remove(session: &mut Session, instances: &[InstanceName]) -> Result<()> {
    require_workspace(session)?;
    if let Some(unknown) = instances
        .iter()
        .find(|name| !session.workspace.state.drivers.contains_key(*name))
    {
        return Err(WorkspaceError::UnknownInstance(unknown.to_string()).into());
    }

    for name in instances {
        session.workspace.remove_driver(name)?;
        session
            .store
            .remove(name)
            .with_context(|| format!("Failed to drop saved options of '{}'", name))?;
    }
    session
        .workspace
        .save()
        .context("Failed to save workspace state")?;

    let removed: Vec<&str> = instances.iter().map(InstanceName::as_str).collect();
    output::print(format!("Removed {}", removed.join(", ")), session.verbosity);
    Ok(())
}

/// Rename an instance in the workspace and the option store.
pub fn rename(session: &mut Session, old: &InstanceName, new: &InstanceName) -> Result<()> {
    require_workspace(session)?;
    session.workspace.rename_driver(old, new)?;
    session
        .store
        .rename(old, new)
        .with_context(|| format!("Failed to move saved options of '{}'", old))?;
    session
        .workspace
        .save()
        .context("Failed to save workspace state")?;

    output::print(format!("Renamed {} to {}", old, new), session.verbosity);
    Ok(())
}

pub fn maintain(
    session: &mut Session,
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
) -> Result<()> {
    require_workspace(session)?;
    run_phase(session, &Phase::Maintain, input, invoker)
}

fn require_workspace(session: &Session) -> Result<()> {
    if session.workspace.is_new() {
        bail!(
            "no workspace in '{}'; run 'forjj create' first",
            session.workspace.root().display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::workspace::Workspace;
    use crate::driver::mock::MemorySchemaSource;
    use crate::engine::{Engine, InternalContext, Parameters};
    use crate::store::{MemoryOptionStore, PersistedOptions, PersistedValue};
    use crate::ui::output::Verbosity;
    use tempfile::TempDir;

    const GITHUB: &str = r#"
plugin: github
task_flags:
  common:
    forjj-organization:
    server:
      default: github.com
  create:
    token:
      required: true
      secure: true
  maintain:
    forjj-workspace-mount:
"#;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, Phase, Parameters)>,
    }

    impl Invoker for Recorder {
        fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<()> {
            self.calls.push((
                invocation.instance.name().to_string(),
                invocation.phase.clone(),
                invocation.parameters.clone(),
            ));
            Ok(())
        }
    }

    fn name(s: &str) -> InstanceName {
        InstanceName::new(s).unwrap()
    }

    fn session(dir: &TempDir, apps: &[&str], store: MemoryOptionStore) -> Session {
        let mut workspace = Workspace::open(dir.path()).unwrap();
        workspace.settle_organization(Some("acme"));
        workspace.settle_infra(None);

        let source = MemorySchemaSource::new().with_document("upstream", "github", GITHUB);
        let mut engine = Engine::new(InternalContext::new("acme", "acme-infra", workspace.dir()));
        for app in apps {
            engine
                .request(&app.parse::<AppSpec>().unwrap(), &store, &source)
                .unwrap();
        }
        let recorded: Vec<_> = workspace
            .state
            .drivers
            .iter()
            .map(|(n, r)| (n.clone(), r.identity()))
            .collect();
        engine.reconcile(recorded, &store, &source).unwrap();
        engine.settle_infra_host(workspace.infra_host()).unwrap();
        engine.build_namespace().unwrap();

        Session {
            verbosity: Verbosity::Quiet,
            config: Config::default(),
            workspace,
            store: Box::new(store),
            source: Box::new(source),
            engine,
        }
    }

    fn input(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn existing_workspace(dir: &TempDir, instances: &[&str]) {
        let mut workspace = Workspace::open(dir.path()).unwrap();
        workspace.settle_organization(Some("acme"));
        workspace.settle_infra(None);
        for instance in instances {
            workspace.record_driver(
                &name(instance),
                &crate::core::types::DriverIdentity::new("upstream", "github"),
                false,
            );
        }
        workspace.save().unwrap();
    }

    #[test]
    fn create_then_maintain_persists_explicit_values() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, &["upstream:github:git1"], MemoryOptionStore::new());
        let mut recorder = Recorder::default();

        create(
            &mut session,
            &input(&[("git1-token", "xyz")]),
            &mut recorder,
            false,
        )
        .unwrap();

        let phases: Vec<_> = recorder.calls.iter().map(|(_, p, _)| p.clone()).collect();
        assert_eq!(phases, vec![Phase::Create, Phase::Maintain]);
        assert_eq!(recorder.calls[0].2["token"], "xyz");
        assert_eq!(recorder.calls[0].2["forjj-organization"], "acme");
        assert!(!recorder.calls[1].2.contains_key("token"));
        assert!(recorder.calls[1].2["forjj-workspace-mount"].ends_with(".forj-workspace"));

        let saved = session.store.load(&name("git1")).unwrap();
        assert_eq!(saved["token"], PersistedValue::secure("xyz"));
        assert!(!saved.contains_key("forjj-organization"));

        let reopened = Workspace::open(dir.path()).unwrap();
        assert!(!reopened.is_new());
        assert!(reopened.state.drivers[&name("git1")].infra_host);
    }

    #[test]
    fn no_maintain_stops_after_create() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, &["upstream:github:git1"], MemoryOptionStore::new());
        let mut recorder = Recorder::default();

        create(&mut session, &input(&[("git1-token", "xyz")]), &mut recorder, true).unwrap();
        assert_eq!(recorder.calls.len(), 1);
    }

    #[test]
    fn every_missing_flag_is_reported_and_nothing_runs() {
        let dir = TempDir::new().unwrap();
        let mut session = session(
            &dir,
            &["upstream:github:git1", "upstream:github:git2"],
            MemoryOptionStore::new(),
        );
        let mut recorder = Recorder::default();

        let err = create(&mut session, &input(&[]), &mut recorder, false).unwrap_err();
        let message = format!("{:#}", err);

        assert!(message.contains("--git1-token"));
        assert!(message.contains("--git2-token"));
        assert!(recorder.calls.is_empty());
        assert!(Workspace::open(dir.path()).unwrap().is_new());
    }

    #[test]
    fn saved_token_satisfies_required_option() {
        let dir = TempDir::new().unwrap();
        let store = MemoryOptionStore::new().with_options(
            name("git1"),
            PersistedOptions::from([("token".to_string(), PersistedValue::secure("abc"))]),
        );
        let mut session = session(&dir, &["upstream:github:git1"], store);
        let mut recorder = Recorder::default();

        create(&mut session, &input(&[]), &mut recorder, true).unwrap();
        assert_eq!(recorder.calls[0].2["token"], "abc");
    }

    #[test]
    fn update_and_maintain_need_a_workspace() {
        let dir = TempDir::new().unwrap();
        let mut session = session(&dir, &[], MemoryOptionStore::new());
        let mut recorder = Recorder::default();

        assert!(update(&mut session, &input(&[]), &mut recorder).is_err());
        assert!(maintain(&mut session, &input(&[]), &mut recorder).is_err());
    }

    #[test]
    fn create_refuses_existing_workspace() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1"]);
        let mut session = session(&dir, &[], MemoryOptionStore::new());

        let err = create(&mut session, &input(&[]), &mut Recorder::default(), false).unwrap_err();
        assert!(err.to_string().contains("already a workspace"));
    }

    #[test]
    fn maintain_uses_recorded_drivers() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1"]);
        let mut session = session(&dir, &[], MemoryOptionStore::new());
        let mut recorder = Recorder::default();

        maintain(&mut session, &input(&[]), &mut recorder).unwrap();
        assert_eq!(recorder.calls.len(), 1);
        assert_eq!(recorder.calls[0].0, "git1");
        assert_eq!(recorder.calls[0].2["server"], "github.com");
    }

    #[test]
    fn add_rejects_known_instances() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1"]);
        let mut session = session(&dir, &[], MemoryOptionStore::new());
        let apps = vec!["upstream:github:git1".parse::<AppSpec>().unwrap()];

        let err = add(&mut session, &apps, &input(&[]), &mut Recorder::default()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn add_records_new_instances() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1"]);
        let mut session = session(&dir, &["upstream:github:git2"], MemoryOptionStore::new());
        let apps = vec!["upstream:github:git2".parse::<AppSpec>().unwrap()];
        let mut recorder = Recorder::default();

        add(&mut session, &apps, &input(&[]), &mut recorder).unwrap();

        assert_eq!(recorder.calls.len(), 2);
        let reopened = Workspace::open(dir.path()).unwrap();
        assert!(reopened.state.drivers.contains_key(&name("git2")));
    }

    #[test]
    fn remove_drops_state_and_options() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1", "git2"]);
        let store = MemoryOptionStore::new().with_options(
            name("git1"),
            PersistedOptions::from([("server".to_string(), PersistedValue::new("ghe"))]),
        );
        let mut session = session(&dir, &[], store);

        assert!(remove(&mut session, &[name("git1"), name("ci9")]).is_err());
        remove(&mut session, &[name("git1")]).unwrap();

        assert!(session.store.load(&name("git1")).unwrap().is_empty());
        let reopened = Workspace::open(dir.path()).unwrap();
        assert!(!reopened.state.drivers.contains_key(&name("git1")));
        assert!(reopened.state.drivers.contains_key(&name("git2")));
    }

    #[test]
    fn rename_moves_state_and_options() {
        let dir = TempDir::new().unwrap();
        existing_workspace(&dir, &["git1"]);
        let store = MemoryOptionStore::new().with_options(
            name("git1"),
            PersistedOptions::from([("server".to_string(), PersistedValue::new("ghe"))]),
        );
        let mut session = session(&dir, &[], store);

        rename(&mut session, &name("git1"), &name("origin")).unwrap();

        assert_eq!(
            session.store.load(&name("origin")).unwrap()["server"].value,
            "ghe"
        );
        let reopened = Workspace::open(dir.path()).unwrap();
        assert!(reopened.state.drivers.contains_key(&name("origin")));
        assert!(!reopened.state.drivers.contains_key(&name("git1")));
    }
}
