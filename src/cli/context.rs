//! cli::context
//!
//! Pre-scan of the raw command line.
//!
//! Driver flags can only be declared once the drivers are known, and the
//! drivers depend on a handful of options (workspace, `--apps`, ...). This
//! module reads just those options from argv before clap parses it. The full parse
//! happens later, on a command extended with the driver flags.
//!
//! Which built-in flags take a value is read from the [`Cli`] definition.
//! Anything the scan does not understand is skipped; clap reports it
//! during the full parse.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::PathBuf;

use clap::CommandFactory;

use crate::cli::args::Cli;
use crate::core::types::AppSpec;

/// Options needed before the flag namespace can be built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub verb: Option<String>,
    pub workspace: Option<PathBuf>,
    pub apps: Vec<AppSpec>,
    pub organization: Option<String>,
    pub infra: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub contribs_repo: Option<String>,
    pub debug: bool,
    pub quiet: bool,
}

/// A built-in short flag.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShortFlag {
    long: Option<String>,
    takes_value: bool,
}

/// Built-in flags of a command and its subcommands.
#[derive(Debug, Default)]
struct BuiltinFlags {
    /// Long names of flags without a value.
    switches: BTreeSet<String>,
    shorts: BTreeMap<char, ShortFlag>,
}

impl BuiltinFlags {
    fn from_command(mut command: clap::Command) -> Self {
        // Adds the generated help and version flags.
        command.build();
        let mut flags = Self::default();
        flags.collect(&command);
        flags
    }

    fn collect(&mut self, command: &clap::Command) {
        for arg in command.get_arguments() {
            let takes_value = arg.get_action().takes_values();
            if let (Some(long), false) = (arg.get_long(), takes_value) {
                self.switches.insert(long.to_string());
            }
            if let Some(short) = arg.get_short() {
                self.shorts.insert(
                    short,
                    ShortFlag {
                        long: arg.get_long().map(str::to_string),
                        takes_value,
                    },
                );
            }
        }
        for sub in command.get_subcommands() {
            self.collect(sub);
        }
    }
}

impl InvocationContext {
    /// Scan `args`, program name included.
    pub fn scan<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::scan_with(&BuiltinFlags::from_command(Cli::command()), args)
    }

    fn scan_with<I, T>(builtins: &BuiltinFlags, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|a| a.into().to_string_lossy().into_owned())
            .collect();

        let mut context = Self::default();
        let mut positionals = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positionals.extend(iter.by_ref().cloned());
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (long, None),
                };
                if builtins.switches.contains(name) {
                    context.switch(name);
                    continue;
                }
                let value = inline.or_else(|| iter.next().cloned());
                if let Some(value) = value {
                    context.set(name, value);
                }
                continue;
            }

            if arg.starts_with('-') && arg.len() > 1 {
                let rest = &arg[1..];
                let Some(short) = rest.chars().next() else {
                    continue;
                };
                let Some(flag) = builtins.shorts.get(&short) else {
                    continue;
                };
                let long = flag.long.as_deref().unwrap_or_default();
                if !flag.takes_value {
                    context.switch(long);
                    continue;
                }
                let attached = &rest[short.len_utf8()..];
                let value = if attached.is_empty() {
                    iter.next().cloned()
                } else {
                    Some(attached.trim_start_matches('=').to_string())
                };
                if let Some(value) = value {
                    context.set(long, value);
                }
                continue;
            }

            positionals.push(arg.clone());
        }

        let mut positionals = positionals.into_iter();
        context.verb = positionals.next();
        if context.verb.as_deref() == Some("create") {
            if let Some(workspace) = positionals.next() {
                context.workspace = Some(PathBuf::from(workspace));
            }
        }
        context
    }

    fn switch(&mut self, name: &str) {
        match name {
            "debug" => self.debug = true,
            "quiet" => self.quiet = true,
            _ => {}
        }
    }

    fn set(&mut self, name: &str, value: String) {
        match name {
            "workspace" => self.workspace = Some(PathBuf::from(value)),
            "organization" => self.organization = Some(value),
            "infra" => self.infra = Some(value),
            "credentials-file" => self.credentials_file = Some(PathBuf::from(value)),
            "contribs-repo" => self.contribs_repo = Some(value),
            "apps" => {
                for spec in value.split(',').filter(|s| !s.is_empty()) {
                    match spec.parse::<AppSpec>() {
                        Ok(app) => self.apps.push(app),
                        Err(e) => tracing::debug!(spec, error = %e, "app spec left to the parser"),
                    }
                }
            }
            _ => {}
        }
    }
}
