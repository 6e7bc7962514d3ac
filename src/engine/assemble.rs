//! engine::assemble
//!
//! Parameter Assembler.
//!
//! Turns the resolved slots of one (instance, phase) pair into the flat
//! option -> value map handed to the plugin. Values are cached per phase by
//! composed flag name; the cache of a phase is dropped whenever that phase
//! is resolved again.

use std::collections::BTreeMap;

use super::EngineError;
use crate::core::naming::compose_flag_name;
use crate::core::types::Phase;
use crate::driver::{DriverInstance, OptionSlot};

/// Plugin-facing option name -> value.
pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct Assembler {
    cache: BTreeMap<Phase, BTreeMap<String, String>>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget cached values of `phase`.
    pub fn invalidate(&mut self, phase: &Phase) {
        self.cache.remove(phase);
    }

    /// Number of cached values for `phase`.
    pub fn cached(&self, phase: &Phase) -> usize {
        self.cache.get(phase).map_or(0, BTreeMap::len)
    }

    /// Build the parameters of `instance` for `phase`.
    ///
    /// Common values go in first and phase-specific values overlay them.
    /// Empty values are left out.
    ///
    /// # Errors
    ///
    /// - `EngineError::InvalidPhase` for `common`
    /// - `EngineError::UnresolvedRequiredOption` listing every required
    ///   flag without a value
    pub fn assemble(
        &mut self,
        instance: &DriverInstance,
        phase: &Phase,
    ) -> Result<Parameters, EngineError> {
        if *phase == Phase::Common {
            return Err(EngineError::InvalidPhase(
                "parameters are assembled for create, update or maintain".to_string(),
            ));
        }

        let cache = self.cache.entry(phase.clone()).or_default();
        let (common, specific): (Vec<&OptionSlot>, Vec<&OptionSlot>) =
            instance.options(phase).partition(|slot| slot.is_common());

        let mut parameters = Parameters::new();
        let mut missing = Vec::new();
        for slot in common.into_iter().chain(specific) {
            let flag = slot
                .flag
                .clone()
                .unwrap_or_else(|| compose_flag_name(instance.name(), &slot.schema.name));

            let value = cache
                .entry(flag.clone())
                .or_insert_with(|| slot.value().unwrap_or_default().to_string());

            if !value.is_empty() {
                parameters.insert(slot.schema.name.clone(), value.clone());
            } else if slot.schema.required && slot.schema.internal_key().is_none() {
                missing.push(flag);
            }
        }

        if !missing.is_empty() {
            return Err(EngineError::UnresolvedRequiredOption {
                instance: instance.name().clone(),
                phase: phase.clone(),
                flags: missing,
            });
        }

        tracing::debug!(
            instance = %instance.name(),
            phase = %phase,
            parameters = parameters.len(),
            "parameters assembled"
        );
        Ok(parameters)
    }
}

/// Render missing flags the way a user types them.
pub(crate) fn render_flags(flags: &[String]) -> String {
    flags
        .iter()
        .map(|f| format!("--{}", f))
        .collect::<Vec<_>>()
        .join(", ")
}
