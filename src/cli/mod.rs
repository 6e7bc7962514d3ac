//! cli
//!
//! Command-line interface layer for forjj.
//!
//! # Responsibilities
//!
//! - Read the context options from argv
//! - Prepare the session and build the driver flag namespace
//! - Parse the full command line and dispatch to a handler
//!
//! # Architecture
//!
//! The command line depends on the drivers in use, so parsing happens in
//! two steps:
//!
//! ```text
//! argv -> pre-scan -> session (drivers) -> build_namespace -> clap parse -> dispatch
//! ```
//!
//! Configuration errors (duplicate instances, flag collisions) are reported
//! before clap sees the command line.

pub mod args;
pub mod commands;
pub mod context;
pub mod session;
pub mod surface;

pub use args::{Cli, Command};
pub use context::InvocationContext;
pub use session::Session;

use std::ffi::OsString;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::engine::namespace;
use crate::invoke::PlanPrinter;
use crate::ui::output::Verbosity;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let context = InvocationContext::scan(argv.iter().cloned());
    init_logging(Verbosity::from_flags(context.quiet, context.debug));

    let base = Cli::command();
    let known_verb = context
        .verb
        .as_deref()
        .is_some_and(|verb| base.find_subcommand(verb).is_some());
    if !known_verb {
        // Help, version or a usage error; clap exits on its own.
        Cli::parse_from(&argv);
    }

    let reserved = args::reserved_flags(&base);
    let mut session = Session::prepare(&context, reserved)?;
    session.engine.build_namespace()?;

    let Some(graph) = session.engine.graph() else {
        anyhow::bail!("the driver flag namespace was not built");
    };
    let mut surface = surface::ClapSurface::new(base);
    namespace::project(graph, &mut surface);
    let matches = surface.into_command().get_matches_from(&argv);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());
    let input = surface::explicit_input(&matches, matches.subcommand().map(|(_, m)| m), graph);
    tracing::debug!(verb = cli.command.verb(), flags = input.len(), "command line parsed");

    let stdout = std::io::stdout();
    let mut printer = PlanPrinter::new(stdout.lock());
    commands::dispatch(cli, &mut session, &input, &mut printer)
}

/// Install the stderr `tracing` subscriber. `RUST_LOG` wins over flags.
fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
