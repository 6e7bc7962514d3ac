//! invoke
//!
//! The invocation collaborator.
//!
//! Running a plugin (socket or container transport) happens behind the
//! [`Invoker`] trait. The shipped [`PlanPrinter`] writes the request each
//! plugin would receive as one JSON document per line, with secure values
//! masked.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::Phase;
use crate::driver::DriverInstance;
use crate::engine::Parameters;
use crate::ui::output::mask;

/// One (instance, phase) call.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub instance: &'a DriverInstance,
    pub phase: &'a Phase,
    pub parameters: &'a Parameters,
}

pub trait Invoker {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PlanEntry<'a> {
    instance: &'a str,
    #[serde(rename = "type")]
    driver_type: &'a str,
    driver: &'a str,
    action: &'a str,
    infra_host: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    socket: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flag_file: Option<&'a str>,
    options: Parameters,
}

/// Prints each invocation as a JSON line.
#[derive(Debug)]
pub struct PlanPrinter<W: Write> {
    out: W,
}

impl<W: Write> PlanPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Invoker for PlanPrinter<W> {
    fn invoke(&mut self, invocation: &Invocation<'_>) -> Result<()> {
        let instance = invocation.instance;
        let runtime = instance.runtime();
        let options = invocation
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), mask(value, instance.is_secure(name))))
            .collect();

        let entry = PlanEntry {
            instance: instance.name().as_str(),
            driver_type: instance.driver_type(),
            driver: instance.driver(),
            action: invocation.phase.as_str(),
            infra_host: instance.is_infra_host(),
            socket: runtime.and_then(|r| r.socket.as_deref()),
            flag_file: runtime.map(|r| r.flag_file.as_str()),
            options,
        };

        serde_json::to_writer(&mut self.out, &entry)
            .with_context(|| format!("cannot write plan of '{}'", instance.name()))?;
        writeln!(self.out)?;
        tracing::info!(instance = %instance.name(), action = %invocation.phase, "driver invoked");
        Ok(())
    }
}
