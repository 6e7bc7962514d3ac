//! driver::schema
//!
//! Plugin option schemas and plugin document decoding.
//!
//! # Document Format
//!
//! Each driver ships a YAML document describing itself:
//!
//! ```yaml
//! plugin: github
//! version: "0.1"
//! description: GitHub upstream driver
//! runtime:
//!   service_type: REST API
//!   docker_image: forjdevops/forjj-github
//!   service:
//!     socket: github.sock
//! created_flag_file: "{{ .InstanceName }}/forjj-{{ .Name }}.yaml"
//! task_flags:
//!   common:
//!     forjj-infra:
//!     debug:
//!       help: debug the driver
//!   create:
//!     token:
//!       help: GitHub token
//!       required: true
//!       secure: true
//! ```
//!
//! Anything else in the document is ignored. Decoding produces a flat,
//! deterministically ordered list of [`OptionSchema`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::naming::internal_key;
use crate::core::types::{InstanceName, Phase};

/// Errors from decoding a plugin document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("malformed plugin document: {0}")]
    Malformed(String),

    #[error("plugin document does not declare a 'plugin' name")]
    MissingName,

    #[error("invalid option '{option}' in phase '{phase}': {reason}")]
    InvalidOption {
        phase: String,
        option: String,
        reason: String,
    },

    #[error("invalid created_flag_file template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// One configurable value a plugin exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSchema {
    /// Unique within the plugin.
    pub name: String,
    pub help: String,
    pub default: Option<String>,
    pub required: bool,
    /// The value must never be shown as a default.
    pub secure: bool,
    pub phase: Phase,
}

impl OptionSchema {
    pub fn new(name: impl Into<String>, phase: Phase) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            default: None,
            required: false,
            secure: false,
            phase,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Default that may be displayed in help output.
    ///
    /// Always `None` for secure options.
    pub fn visible_default(&self) -> Option<&str> {
        if self.secure {
            None
        } else {
            self.default.as_deref()
        }
    }

    /// Internal-context key when the option is in the reserved namespace.
    pub fn internal_key(&self) -> Option<&str> {
        internal_key(&self.name)
    }
}

/// Runtime information of a loaded plugin.
///
/// Set once when the schema is loaded and never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeMetadata {
    pub plugin: String,
    pub version: Option<String>,
    pub service_type: Option<String>,
    pub docker_image: Option<String>,
    pub socket: Option<String>,
    pub parameters: Vec<String>,
    /// File whose presence marks the instance as created.
    pub flag_file: String,
    /// True when forjj, not the plugin, writes the flag file.
    pub forjj_flag_file: bool,
}

/// A decoded plugin document.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSchema {
    pub plugin: String,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Sorted by phase, then option name.
    pub options: Vec<OptionSchema>,
    runtime: RawRuntime,
    created_flag_file: Option<String>,
}

impl PluginSchema {
    /// Decode a plugin document.
    ///
    /// # Errors
    ///
    /// - `SchemaError::Malformed` if the bytes are not a YAML mapping of the
    ///   expected shape
    /// - `SchemaError::MissingName` if `plugin` is absent or empty
    /// - `SchemaError::InvalidOption` for unusable option names or defaults
    pub fn decode(bytes: &[u8]) -> Result<Self, SchemaError> {
        let raw: RawPlugin =
            serde_yaml::from_slice(bytes).map_err(|e| SchemaError::Malformed(e.to_string()))?;

        if raw.plugin.trim().is_empty() {
            return Err(SchemaError::MissingName);
        }

        let mut options = Vec::new();
        for (tag, flags) in raw.task_flags {
            let phase = Phase::parse(&tag).map_err(|e| SchemaError::Malformed(e.to_string()))?;
            if phase.is_custom() {
                tracing::warn!(
                    plugin = %raw.plugin,
                    phase = %phase,
                    "unknown task tag; valid ones are common, create, update, maintain"
                );
            }

            for (name, flag) in flags.unwrap_or_default() {
                validate_option_name(&phase, &name)?;
                let flag = flag.unwrap_or_default();
                let default = match flag.default {
                    Some(value) => scalar_to_string(value).map_err(|reason| {
                        SchemaError::InvalidOption {
                            phase: phase.to_string(),
                            option: name.clone(),
                            reason,
                        }
                    })?,
                    None => None,
                };

                options.push(OptionSchema {
                    name,
                    help: flag.help,
                    default,
                    required: flag.required,
                    secure: flag.secure,
                    phase: phase.clone(),
                });
            }
        }
        options.sort_by(|a, b| (&a.phase, &a.name).cmp(&(&b.phase, &b.name)));

        Ok(Self {
            plugin: raw.plugin,
            version: raw.version.and_then(|v| scalar_to_string(v).ok().flatten()),
            description: raw.description,
            options,
            runtime: raw.runtime.unwrap_or_default(),
            created_flag_file: raw.created_flag_file.filter(|f| !f.is_empty()),
        })
    }

    /// Options declared for one phase.
    pub fn options_in<'a>(&'a self, phase: &'a Phase) -> impl Iterator<Item = &'a OptionSchema> {
        self.options.iter().filter(move |o| &o.phase == phase)
    }

    /// Build the runtime metadata for one instance of this plugin.
    ///
    /// # Errors
    ///
    /// `SchemaError::InvalidTemplate` if `created_flag_file` uses an unknown
    /// template field.
    pub fn runtime_metadata(
        &self,
        instance: &InstanceName,
        driver: &str,
    ) -> Result<RuntimeMetadata, SchemaError> {
        let (flag_file, forjj_flag_file) = match &self.created_flag_file {
            Some(template) => (render_flag_file(template, instance, driver)?, false),
            None => (format!(".{}.created", instance), true),
        };

        let service = self.runtime.service.clone().unwrap_or_default();
        Ok(RuntimeMetadata {
            plugin: self.plugin.clone(),
            version: self.version.clone(),
            service_type: self.runtime.service_type.clone(),
            docker_image: self.runtime.docker_image.clone(),
            socket: service.socket,
            parameters: service.parameters,
            flag_file,
            forjj_flag_file,
        })
    }
}

/// Render a `created_flag_file` template.
///
/// Supports `{{ .InstanceName }}` and `{{ .Name }}` (the driver name).
///
/// # Example
///
/// ```
/// use forjj::core::types::InstanceName;
/// use forjj::driver::schema::render_flag_file;
///
/// let git1 = InstanceName::new("git1").unwrap();
/// let rendered = render_flag_file("{{ .InstanceName }}/{{.Name}}.yaml", &git1, "github").unwrap();
/// assert_eq!(rendered, "git1/github.yaml");
/// ```
pub fn render_flag_file(
    template: &str,
    instance: &InstanceName,
    driver: &str,
) -> Result<String, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidTemplate {
        template: template.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| invalid("unclosed '{{'".to_string()))?;
        match after[..end].trim() {
            ".InstanceName" => out.push_str(instance.as_str()),
            ".Name" => out.push_str(driver),
            other => return Err(invalid(format!("unknown field '{}'", other))),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn validate_option_name(phase: &Phase, name: &str) -> Result<(), SchemaError> {
    let reason = if name.is_empty() {
        Some("name cannot be empty")
    } else if name.starts_with('-') {
        Some("name cannot start with '-'")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Some("name may only contain letters, digits, '-' and '_'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SchemaError::InvalidOption {
            phase: phase.to_string(),
            option: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn scalar_to_string(value: serde_yaml::Value) -> Result<Option<String>, String> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) => Ok(Some(s)),
        serde_yaml::Value::Number(n) => Ok(Some(n.to_string())),
        serde_yaml::Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err("default must be a scalar".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RawPlugin {
    #[serde(default)]
    plugin: String,
    #[serde(default)]
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    runtime: Option<RawRuntime>,
    #[serde(default)]
    created_flag_file: Option<String>,
    #[serde(default)]
    task_flags: BTreeMap<String, Option<BTreeMap<String, Option<RawFlag>>>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFlag {
    #[serde(default)]
    help: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    secure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct RawRuntime {
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    docker_image: Option<String>,
    #[serde(default)]
    service: Option<RawService>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct RawService {
    #[serde(default)]
    socket: Option<String>,
    #[serde(default)]
    parameters: Vec<String>,
}
