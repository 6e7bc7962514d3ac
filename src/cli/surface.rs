//! cli::surface
//!
//! Projection of the flag namespace onto clap.
//!
//! [`ClapSurface`] turns each external [`ComposedFlag`] into a string
//! option: common flags become global options, phase flags are added to
//! the verbs of their phase. After parsing, [`explicit_input`] reads back
//! only the values the user actually typed.

use std::collections::BTreeMap;

use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::core::types::Phase;
use crate::engine::{ComposedFlag, FlagGraph, FlagSurface};

/// A clap command being extended with driver flags.
#[derive(Debug, Default)]
pub struct ClapSurface {
    command: Command,
}

impl ClapSurface {
    pub fn new(command: Command) -> Self {
        Self { command }
    }

    pub fn into_command(self) -> Command {
        self.command
    }

    fn update(&mut self, f: impl FnOnce(Command) -> Command) {
        let command = std::mem::take(&mut self.command);
        self.command = f(command);
    }
}

impl FlagSurface for ClapSurface {
    fn add_app_flag(&mut self, flag: &ComposedFlag) {
        let arg = driver_arg(flag).global(true);
        self.update(|command| command.arg(arg));
    }

    fn add_phase_flag(&mut self, phase: &Phase, flag: &ComposedFlag) {
        for verb in phase.verbs() {
            if self.command.find_subcommand(verb).is_none() {
                continue;
            }
            let arg = driver_arg(flag);
            self.update(|command| command.mut_subcommand(*verb, |sub| sub.arg(arg)));
        }
    }
}

/// Build the clap option for one composed flag.
///
/// Required flags are not enforced by clap: the same flag is shared by
/// verbs that never invoke a driver, and missing values are reported all
/// at once when parameters are assembled.
fn driver_arg(flag: &ComposedFlag) -> Arg {
    let mut help = if flag.help.is_empty() {
        format!("{} option of {}", flag.option, flag.instance)
    } else {
        flag.help.clone()
    };
    if flag.required {
        help.push_str(" [required]");
    }

    let arg = Arg::new(flag.name.clone())
        .long(flag.name.clone())
        .value_name("VALUE")
        .action(ArgAction::Set)
        .value_parser(value_parser!(String))
        .help(help)
        .help_heading(format!("Driver {}", flag.instance));

    match &flag.default {
        Some(default) if !flag.secure => arg.default_value(default.clone()),
        _ => arg,
    }
}

/// Driver flag values typed on the command line.
///
/// `leaf` is the matched verb, looked at before `root`. Defaults and
/// environment values are not explicit input.
pub fn explicit_input(
    root: &ArgMatches,
    leaf: Option<&ArgMatches>,
    graph: &FlagGraph,
) -> BTreeMap<String, String> {
    let mut input = BTreeMap::new();
    for matches in leaf.into_iter().chain(std::iter::once(root)) {
        for id in matches.ids() {
            let name = id.as_str();
            if input.contains_key(name) {
                continue;
            }
            let Some(flag) = graph.get(name) else {
                continue;
            };
            if flag.is_internal() || matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Ok(Some(value)) = matches.try_get_one::<String>(name) {
                input.insert(name.to_string(), value.clone());
            }
        }
    }
    input
}
