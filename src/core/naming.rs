//! core::naming
//!
//! Flag naming rules.
//!
//! # Features
//!
//! - Compose the external flag name for an (instance, option) pair
//! - Recognise options in the reserved internal-context namespace
//! - Select the naming policy used when projecting options onto the CLI

use serde::{Deserialize, Serialize};

use crate::core::types::InstanceName;

/// Prefix of options whose value forjj computes itself.
///
/// A plugin declaring `forjj-organization` receives the organization name;
/// such options are never settable from the command line.
pub const INTERNAL_PREFIX: &str = "forjj-";

/// Return the internal-context key of a reserved option name.
///
/// The text after the prefix is returned verbatim, even when it is not a
/// key forjj knows about.
///
/// # Example
///
/// ```
/// use forjj::core::naming::internal_key;
///
/// assert_eq!(internal_key("forjj-organization"), Some("organization"));
/// assert_eq!(internal_key("forjj-"), Some(""));
/// assert_eq!(internal_key("token"), None);
/// ```
pub fn internal_key(option: &str) -> Option<&str> {
    option.strip_prefix(INTERNAL_PREFIX)
}

/// Compose the external flag name for an option of an instance.
///
/// # Example
///
/// ```
/// use forjj::core::naming::compose_flag_name;
/// use forjj::core::types::InstanceName;
///
/// let git1 = InstanceName::new("git1").unwrap();
/// assert_eq!(compose_flag_name(&git1, "token"), "git1-token");
/// ```
pub fn compose_flag_name(instance: &InstanceName, option: &str) -> String {
    format!("{}-{}", instance, option)
}

/// How driver options are named on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlagNaming {
    /// Always `instance-option`.
    #[default]
    Prefixed,
    /// The bare option name when only one instance declares it.
    ShortWhenUnique,
}

impl FlagNaming {
    pub const VALID_NAMES: &'static [&'static str] = &["prefixed", "short-when-unique"];

    /// Name an external option.
    ///
    /// `unique` tells whether the option name is declared by exactly one
    /// loaded instance. Internal-context options are always prefixed.
    pub fn name(&self, instance: &InstanceName, option: &str, unique: bool) -> String {
        match self {
            FlagNaming::ShortWhenUnique if unique && internal_key(option).is_none() => {
                option.to_string()
            }
            _ => compose_flag_name(instance, option),
        }
    }
}
