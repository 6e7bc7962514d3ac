//! cli::session
//!
//! Everything a verb needs before the command line is fully parsed.
//!
//! [`Session::prepare`] loads the configuration and the workspace, picks
//! the schema source and the option store, then registers the requested
//! and recorded drivers on a fresh [`Engine`].
//!
//! # Precedence
//!
//! - Plugin documents: `--contribs-repo` / `$CONTRIBS_REPO`, then the
//!   workspace, then the global config
//! - Option store: `--credentials-file`, then the global config, then
//!   `<workspace>/.forj-workspace/creds-forjj.yml`
//! - Workspace: `create <WORKSPACE>` or `--workspace`, then
//!   `$FORJJ_WORKSPACE`, then the current directory

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::context::InvocationContext;
use crate::core::config::Config;
use crate::core::workspace::Workspace;
use crate::driver::registry::error_chain;
use crate::driver::{create_source, SchemaSource};
use crate::engine::{Engine, InternalContext};
use crate::store::{FileOptionStore, OptionStore};
use crate::ui::output::{self, Verbosity};

/// Loaded state of one invocation.
pub struct Session {
    pub verbosity: Verbosity,
    pub config: Config,
    pub workspace: Workspace,
    pub store: Box<dyn OptionStore>,
    pub source: Box<dyn SchemaSource>,
    pub engine: Engine,
}

impl Session {
    /// Load everything and register drivers.
    ///
    /// `reserved` are the built-in flag names driver flags may not use.
    pub fn prepare(context: &InvocationContext, reserved: BTreeSet<String>) -> Result<Self> {
        let verbosity = Verbosity::from_flags(context.quiet, context.debug);
        let config = Config::load().context("Failed to load configuration")?;
        if let Some(path) = config.loaded_from() {
            tracing::debug!(path = %path.display(), "configuration loaded");
        }

        let root = workspace_root(context)?;
        let mut workspace = Workspace::open(&root)
            .with_context(|| format!("Failed to open workspace '{}'", root.display()))?;

        if let Some(warning) = workspace.settle_organization(context.organization.as_deref()) {
            output::warn(warning, verbosity);
        }
        if let Some(warning) = workspace.settle_infra(context.infra.as_deref()) {
            output::warn(warning, verbosity);
        }

        let requested = context
            .contribs_repo
            .clone()
            .or_else(|| std::env::var("CONTRIBS_REPO").ok())
            .filter(|location| !location.is_empty());
        if let Some(location) = requested {
            workspace.state.contribs_repo = Some(location);
        }
        let location = workspace
            .state
            .contribs_repo
            .clone()
            .unwrap_or_else(|| config.contribs_repo().to_string());
        let source = create_source(&location)
            .with_context(|| format!("Cannot read plugin documents from '{}'", location))?;
        tracing::debug!(location = %source.location(), "plugin documents source");

        let store_path = context
            .credentials_file
            .clone()
            .or_else(|| config.credentials_file().map(Path::to_path_buf))
            .unwrap_or_else(|| workspace.default_credentials_path());
        let store = FileOptionStore::new(store_path);
        match store.verify_permissions() {
            Ok(true) => {}
            Ok(false) => output::warn(
                format!(
                    "'{}' is readable by other users; expected mode 0600",
                    store.path().display()
                ),
                verbosity,
            ),
            Err(e) => tracing::debug!(error = %e, "cannot check options file permissions"),
        }

        let internal = InternalContext::new(
            workspace.state.organization.clone().unwrap_or_default(),
            workspace.infra().unwrap_or_default(),
            workspace.dir(),
        );
        let mut engine = Engine::new(internal)
            .with_naming(config.flag_naming())
            .with_reserved_flags(reserved);

        for app in &context.apps {
            engine.request(app, &store, source.as_ref())?;
        }
        let recorded: Vec<_> = workspace
            .state
            .drivers
            .iter()
            .map(|(name, record)| (name.clone(), record.identity()))
            .collect();
        engine.reconcile(recorded, &store, source.as_ref())?;
        engine.settle_infra_host(workspace.infra_host())?;

        for skipped in engine.skipped() {
            output::warn(
                format!(
                    "{} ({}) is skipped: {}",
                    skipped.name,
                    skipped.identity,
                    error_chain(&skipped.error)
                ),
                verbosity,
            );
        }

        Ok(Self {
            verbosity,
            config,
            workspace,
            store: Box::new(store),
            source,
            engine,
        })
    }
}

fn workspace_root(context: &InvocationContext) -> Result<PathBuf> {
    if let Some(path) = &context.workspace {
        return Ok(path.clone());
    }
    if let Some(path) = std::env::var_os("FORJJ_WORKSPACE").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    std::env::current_dir().context("Failed to determine the current directory")
}
