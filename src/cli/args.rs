//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--apps <type:driver[:instance]>`: Drivers to use for this run
//! - `--organization` / `-O`, `--infra` / `-I`: Workspace identity
//! - `--credentials-file` / `-C`: Options store location
//! - `--contribs-repo`: Where plugin documents are read from
//!
//! Driver flags are not declared here. They are added to the built
//! [`clap::Command`] at run time by [`crate::cli::surface`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::types::{AppSpec, InstanceName};

/// forjj - Drive DevOps plugins through one command line
#[derive(Parser, Debug)]
#[command(name = "forjj")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Drivers to use, as type:driver[:instance] (comma separated)
    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        value_name = "TYPE:DRIVER[:INSTANCE]"
    )]
    pub apps: Vec<AppSpec>,

    /// Organization name (recorded once per workspace)
    #[arg(short = 'O', long, global = true)]
    pub organization: Option<String>,

    /// Infra repository name (defaults to <organization>-infra)
    #[arg(short = 'I', long, global = true)]
    pub infra: Option<String>,

    /// File holding saved driver options and credentials
    #[arg(short = 'C', long, global = true, value_name = "PATH")]
    pub credentials_file: Option<PathBuf>,

    /// Plugin documents location (directory or URL)
    #[arg(long, global = true, env = "CONTRIBS_REPO", value_name = "LOCATION")]
    pub contribs_repo: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Workspace location for verbs working on an existing workspace.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArg {
    /// Workspace directory
    #[arg(
        short = 'W',
        long = "workspace",
        env = "FORJJ_WORKSPACE",
        value_name = "PATH"
    )]
    pub path: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a workspace and run the create phase of every driver
    #[command(after_help = "\
EXAMPLES:
    forjj create ~/acme --apps upstream:github,ci:jenkins -O acme --github-token <TOKEN>
    forjj create ~/acme --apps upstream:github:git1 --no-maintain")]
    Create {
        /// Workspace directory
        workspace: PathBuf,

        /// Stop after the create phase
        #[arg(long)]
        no_maintain: bool,
    },

    /// Run the update phase of every driver
    Update {
        #[command(flatten)]
        workspace: WorkspaceArg,
    },

    /// Add driver instances (given with --apps) to the workspace
    Add {
        #[command(flatten)]
        workspace: WorkspaceArg,
    },

    /// Remove driver instances from the workspace
    Remove {
        #[command(flatten)]
        workspace: WorkspaceArg,

        /// Instances to remove
        #[arg(required = true, value_name = "INSTANCE")]
        instances: Vec<InstanceName>,
    },

    /// Rename a driver instance
    Rename {
        #[command(flatten)]
        workspace: WorkspaceArg,

        /// Current instance name
        old: InstanceName,

        /// New instance name
        new: InstanceName,
    },

    /// Run the maintain phase of every driver
    Maintain {
        #[command(flatten)]
        workspace: WorkspaceArg,
    },

    /// Show driver instances and their flags
    List {
        #[command(flatten)]
        workspace: WorkspaceArg,
    },
}

impl Command {
    /// The verb as typed on the command line.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Update { .. } => "update",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Rename { .. } => "rename",
            Command::Maintain { .. } => "maintain",
            Command::List { .. } => "list",
        }
    }
}

/// Names driver flags may not take.
///
/// Covers long names and argument ids of `command` and all of its
/// subcommands, plus clap's own `help` and `version`.
pub fn reserved_flags(command: &clap::Command) -> BTreeSet<String> {
    let mut reserved = BTreeSet::from(["help".to_string(), "version".to_string()]);
    collect_reserved(command, &mut reserved);
    reserved
}

fn collect_reserved(command: &clap::Command, reserved: &mut BTreeSet<String>) {
    for arg in command.get_arguments() {
        reserved.insert(arg.get_id().as_str().to_string());
        if let Some(long) = arg.get_long() {
            reserved.insert(long.to_string());
        }
    }
    for sub in command.get_subcommands() {
        collect_reserved(sub, reserved);
    }
}
