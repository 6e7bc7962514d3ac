//! driver
//!
//! Driver plugins: what they declare and where their documents come from.
//!
//! # Modules
//!
//! - [`schema`] - Option schemas and plugin document decoding
//! - [`source`] - Schema source trait with local and HTTP implementations
//! - [`instance`] - Per-instance option slots and resolutions
//! - [`registry`] - The run's set of driver instances
//! - [`mock`] - In-memory schema source for tests

pub mod instance;
pub mod mock;
pub mod registry;
pub mod schema;
pub mod source;

pub use instance::{DriverInstance, LoadState, OptionSlot, Resolution, ResolutionSource};
pub use registry::{DriverError, DriverRegistry, SkippedInstance};
pub use schema::{OptionSchema, PluginSchema, RuntimeMetadata, SchemaError};
pub use source::{create_source, SchemaSource, SourceError};
