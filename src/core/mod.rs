//! core
//!
//! Core domain types, naming rules and persisted settings.
//!
//! # Modules
//!
//! - [`types`] - Strong types: InstanceName, Phase, AppSpec, DriverIdentity
//! - [`naming`] - Composed flag naming and the reserved internal-context prefix
//! - [`config`] - Global configuration schema and loading
//! - [`workspace`] - Workspace state persistence
//! - [`atomic`] - Atomic file replacement
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Naming is deterministic

pub mod atomic;
pub mod config;
pub mod naming;
pub mod types;
pub mod workspace;
