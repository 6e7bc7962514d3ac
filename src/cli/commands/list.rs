//! list command - Show driver instances, their flags and saved options

use std::fmt::Write as _;

use anyhow::Result;

use crate::cli::session::Session;
use crate::driver::registry::error_chain;
use crate::engine::{ComposedFlag, FlagScope};
use crate::ui::output;

/// Show every loaded instance with its composed flags.
///
/// Secure values are masked; secure defaults are never shown.
pub fn list(session: &Session) -> Result<()> {
    output::print(render(session), session.verbosity);
    Ok(())
}

fn render(session: &Session) -> String {
    let mut out = String::new();
    let workspace = &session.workspace;
    let _ = writeln!(out, "Workspace: {}", workspace.root().display());
    if let Some(org) = &workspace.state.organization {
        let _ = writeln!(out, "Organization: {}", org);
    }
    if let Some(infra) = workspace.infra() {
        let _ = writeln!(out, "Infra: {}", infra);
    }
    let _ = writeln!(out, "Plugins from: {}", session.source.location());
    if let Some(path) = session.config.loaded_from() {
        let _ = writeln!(out, "Config: {}", path.display());
    }

    let engine = &session.engine;
    if engine.registry().is_empty() {
        let _ = writeln!(out, "\nNo driver instances.");
    }

    for instance in engine.registry().iter() {
        let _ = write!(out, "\n{} ({})", instance.name(), instance.identity());
        if instance.is_infra_host() {
            out.push_str(" [infra host]");
        }
        out.push('\n');

        if let Some(graph) = engine.graph() {
            for flag in graph.for_instance(instance.name()) {
                let _ = writeln!(out, "  {}", describe(flag));
            }
        }

        if let Some(saved) = engine.persisted(instance.name()).filter(|s| !s.is_empty()) {
            let values: Vec<String> = saved
                .iter()
                .map(|(option, value)| {
                    let secure = value.secure || instance.is_secure(option);
                    format!("{}={}", option, output::mask(&value.value, secure))
                })
                .collect();
            let _ = writeln!(out, "  saved: {}", values.join(", "));
        }
    }

    if !engine.skipped().is_empty() {
        let _ = writeln!(out, "\nSkipped:");
        for skipped in engine.skipped() {
            let _ = writeln!(
                out,
                "  {} ({}): {}",
                skipped.name,
                skipped.identity,
                error_chain(&skipped.error)
            );
        }
    }

    out.trim_end().to_string()
}

fn describe(flag: &ComposedFlag) -> String {
    let phases = match &flag.scope {
        FlagScope::App => "all phases".to_string(),
        FlagScope::Phases(phases) => phases
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    };

    if flag.is_internal() {
        return format!("{} ({}, set by forjj)", flag, phases);
    }

    let mut line = format!("{} ({})", flag, phases);
    if flag.required {
        line.push_str(" [required]");
    }
    if flag.secure {
        line.push_str(" [secure]");
    } else if let Some(default) = &flag.default {
        let _ = write!(line, " default: {}", default);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::{AppSpec, InstanceName};
    use crate::core::workspace::Workspace;
    use crate::driver::mock::MemorySchemaSource;
    use crate::driver::SourceError;
    use crate::engine::{Engine, InternalContext};
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
      default: not-for-your-eyes
"#;

    fn session(dir: &TempDir) -> Session {
        let workspace = Workspace::open(dir.path()).unwrap();
        let source = MemorySchemaSource::new()
            .with_document("upstream", "github", GITHUB)
            .with_failure("ci", "jenkins", SourceError::NotFound("ci/jenkins".into()));
        let git1 = InstanceName::new("git1").unwrap();
        let store = MemoryOptionStore::new().with_options(
            git1,
            PersistedOptions::from([
                ("token".to_string(), PersistedValue::secure("ghp_secret")),
                ("server".to_string(), PersistedValue::new("ghe.acme.com")),
            ]),
        );

        let mut engine = Engine::new(InternalContext::new("acme", "acme-infra", workspace.dir()));
        for app in ["upstream:github:git1", "ci:jenkins"] {
            engine
                .request(&app.parse::<AppSpec>().unwrap(), &store, &source)
                .unwrap();
        }
        engine.settle_infra_host(None).unwrap();
        engine.build_namespace().unwrap();

        Session {
            verbosity: Verbosity::Normal,
            config: Config::default(),
            workspace,
            store: Box::new(store),
            source: Box::new(source),
            engine,
        }
    }

    #[test]
    fn shows_flags_and_hides_secrets() {
        let dir = TempDir::new().unwrap();
        let rendered = render(&session(&dir));

        assert!(rendered.contains("git1 (upstream:github) [infra host]"));
        assert!(rendered.contains("--git1-server (all phases) default: ghe.acme.com"));
        assert!(rendered.contains("--git1-token (create) [secure]"));
        assert!(rendered.contains("--git1-forjj-organization (all phases, set by forjj)"));
        assert!(rendered.contains("token=********"));
        assert!(rendered.contains("server=ghe.acme.com"));
        assert!(!rendered.contains("ghp_secret"));
        assert!(!rendered.contains("not-for-your-eyes"));
    }

    #[test]
    fn lists_skipped_instances() {
        let dir = TempDir::new().unwrap();
        let rendered = render(&session(&dir));

        assert!(rendered.contains("Skipped:"));
        assert!(rendered.contains("jenkins (ci:jenkins)"));
    }
}
