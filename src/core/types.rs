//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`InstanceName`] - Validated driver instance name
//! - [`Phase`] - Lifecycle phase an option or flag is scoped to
//! - [`DriverIdentity`] - Which driver implementation an instance runs
//! - [`AppSpec`] - `type:driver[:instance]` request from the command line
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use forjj::core::types::{AppSpec, InstanceName, Phase};
//!
//! let name = InstanceName::new("github").unwrap();
//! assert_eq!(name.as_str(), "github");
//! assert!(InstanceName::new("GitHub").is_err());
//!
//! let app: AppSpec = "upstream:github:git1".parse().unwrap();
//! assert_eq!(app.instance.as_str(), "git1");
//!
//! assert_eq!(Phase::parse("create").unwrap(), Phase::Create);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid instance name: {0}")]
    InvalidInstanceName(String),

    #[error("invalid app spec: {0}")]
    InvalidAppSpec(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),
}

/// A validated driver instance name.
///
/// Instance names become the prefix of every composed flag, so they are
/// restricted to characters that are safe on a command line:
/// - Must start with a lowercase ASCII letter
/// - May contain lowercase ASCII letters, digits, `_` and `-`
/// - Cannot end with `-`
///
/// # Example
///
/// ```
/// use forjj::core::types::InstanceName;
///
/// assert!(InstanceName::new("git1").is_ok());
/// assert!(InstanceName::new("jenkins-ci").is_ok());
/// assert!(InstanceName::new("").is_err());
/// assert!(InstanceName::new("1git").is_err());
/// assert!(InstanceName::new("git hub").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstanceName(String);

impl InstanceName {
    /// Create a new validated instance name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidInstanceName` if the name is not usable
    /// as a flag prefix.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let mut chars = name.chars();
        match chars.next() {
            None => {
                return Err(TypeError::InvalidInstanceName(
                    "instance name cannot be empty".into(),
                ))
            }
            Some(c) if !c.is_ascii_lowercase() => {
                return Err(TypeError::InvalidInstanceName(format!(
                    "'{}' must start with a lowercase letter",
                    name
                )))
            }
            Some(_) => {}
        }

        if let Some(bad) =
            chars.find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(TypeError::InvalidInstanceName(format!(
                "'{}' contains invalid character '{}'",
                name, bad
            )));
        }

        if name.ends_with('-') {
            return Err(TypeError::InvalidInstanceName(format!(
                "'{}' cannot end with '-'",
                name
            )));
        }

        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for InstanceName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<InstanceName> for String {
    fn from(name: InstanceName) -> Self {
        name.0
    }
}

impl FromStr for InstanceName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for InstanceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle phase an option applies to.
///
/// `Common` options are shared by every concrete phase. Plugin documents
/// may declare other tags; those are kept as [`Phase::Custom`] so nothing
/// a plugin declares is silently dropped.
///
/// The derived ordering is the declaration order used when projecting
/// options onto the flag namespace: common, create, update, maintain,
/// then custom phases by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Phase {
    Common,
    Create,
    Update,
    Maintain,
    Custom(String),
}

impl Phase {
    /// Phases a plugin is actually invoked for.
    pub fn concrete() -> [Phase; 3] {
        [Phase::Create, Phase::Update, Phase::Maintain]
    }

    /// Parse a phase tag.
    ///
    /// Unknown non-empty tags become [`Phase::Custom`].
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPhase` for an empty tag.
    pub fn parse(tag: &str) -> Result<Self, TypeError> {
        match tag {
            "common" => Ok(Phase::Common),
            "create" => Ok(Phase::Create),
            "update" => Ok(Phase::Update),
            "maintain" => Ok(Phase::Maintain),
            "" => Err(TypeError::InvalidPhase("phase cannot be empty".into())),
            other => Ok(Phase::Custom(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Phase::Common => "common",
            Phase::Create => "create",
            Phase::Update => "update",
            Phase::Maintain => "maintain",
            Phase::Custom(tag) => tag,
        }
    }

    /// True for `create`, `update` and `maintain`.
    pub fn is_concrete(&self) -> bool {
        matches!(self, Phase::Create | Phase::Update | Phase::Maintain)
    }

    /// True for tags outside the known lifecycle.
    pub fn is_custom(&self) -> bool {
        matches!(self, Phase::Custom(_))
    }

    /// CLI verbs that expose flags of this phase.
    pub fn verbs(&self) -> &'static [&'static str] {
        match self {
            Phase::Create => &["create"],
            Phase::Update => &["update", "add", "remove", "rename"],
            Phase::Maintain => &["maintain"],
            Phase::Common | Phase::Custom(_) => &[],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Phase {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}

/// The driver implementation behind an instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverIdentity {
    /// Category, e.g. "upstream" or "ci".
    #[serde(rename = "type")]
    pub driver_type: String,
    /// Implementation identifier, e.g. "github".
    pub driver: String,
}

impl DriverIdentity {
    pub fn new(driver_type: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            driver_type: driver_type.into(),
            driver: driver.into(),
        }
    }
}

impl fmt::Display for DriverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.driver_type, self.driver)
    }
}

/// A driver requested on the command line as `type:driver[:instance]`.
///
/// The instance name defaults to the driver name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSpec {
    pub identity: DriverIdentity,
    pub instance: InstanceName,
}

impl FromStr for AppSpec {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (driver_type, driver, instance) = match parts.as_slice() {
            [t, d] => (*t, *d, *d),
            [t, d, i] => (*t, *d, *i),
            _ => {
                return Err(TypeError::InvalidAppSpec(format!(
                    "'{}' must look like type:driver[:instance]",
                    s
                )))
            }
        };

        if driver_type.is_empty() || driver.is_empty() {
            return Err(TypeError::InvalidAppSpec(format!(
                "'{}' has an empty type or driver",
                s
            )));
        }

        let instance = InstanceName::new(instance)
            .map_err(|e| TypeError::InvalidAppSpec(format!("'{}': {}", s, e)))?;

        Ok(Self {
            identity: DriverIdentity::new(driver_type, driver),
            instance,
        })
    }
}
