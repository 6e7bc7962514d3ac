//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each handler works on a prepared [`Session`]: the engine is sealed and
//! the explicit driver flag values are already extracted from the parsed
//! command line. Lifecycle verbs resolve and assemble through the engine
//! and hand the result to an [`Invoker`].

mod lifecycle;
mod list;

pub use lifecycle::{add, create, maintain, remove, rename, run_phase, update};
pub use list::list;

use std::collections::BTreeMap;

use anyhow::Result;

use super::args::{Cli, Command};
use super::session::Session;
use crate::invoke::Invoker;

/// Dispatch a command to its handler.
pub fn dispatch(
    cli: Cli,
    session: &mut Session,
    input: &BTreeMap<String, String>,
    invoker: &mut dyn Invoker,
) -> Result<()> {
    tracing::debug!(verb = cli.command.verb(), "dispatching");
    match cli.command {
        Command::Create { no_maintain, .. } => create(session, input, invoker, no_maintain),
        Command::Update { .. } => update(session, input, invoker),
        Command::Add { .. } => add(session, &cli.apps, input, invoker),
        Command::Remove { instances, .. } => remove(session, &instances),
        Command::Rename { old, new, .. } => rename(session, &old, &new),
        Command::Maintain { .. } => maintain(session, input, invoker),
        Command::List { .. } => list(session),
    }
}
