//! forjj - Drive DevOps plugins through one command line
//!
//! forjj orchestrates external driver plugins (git hosting, CI, ...). Each
//! plugin describes its options in a YAML document; forjj merges those
//! options into one command line, resolves their values and hands each
//! plugin its parameters.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (pre-scan, clap surface, verbs)
//! - [`engine`] - Flag composition, value resolution and parameter assembly
//! - [`driver`] - Plugin documents, schema sources and the driver registry
//! - [`store`] - Persisted driver options (credentials file)
//! - [`invoke`] - The plugin invocation collaborator
//! - [`core`] - Domain types, naming, configuration and workspace state
//! - [`ui`] - User output utilities
//!
//! # Correctness Invariants
//!
//! 1. Composed flag names are unique; a clash is an error, never an overwrite
//! 2. `forjj-<key>` options only ever receive forjj's own values
//! 3. A plugin that cannot be loaded never blocks the others
//! 4. Secure values are never displayed or logged

pub mod cli;
pub mod core;
pub mod driver;
pub mod engine;
pub mod invoke;
pub mod store;
pub mod ui;
