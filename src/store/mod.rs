//! store
//!
//! Persisted driver options (the credentials file).
//!
//! # Architecture
//!
//! Options are stored through the [`OptionStore`] trait:
//!
//! - [`FileOptionStore`]: YAML file, by default
//!   `<workspace>/.forj-workspace/creds-forjj.yml`
//! - [`MemoryOptionStore`]: in memory, nothing is written
//!
//! # Security
//!
//! - Secure values are never logged or included in error messages
//! - The file store uses 0600 permissions on Unix
//! - All writes are atomic (temp file + rename)
//!
//! # Example
//!
//! ```no_run
//! use forjj::core::types::InstanceName;
//! use forjj::store::{FileOptionStore, OptionStore, PersistedOptions, PersistedValue};
//!
//! let store = FileOptionStore::new("/ws/.forj-workspace/creds-forjj.yml");
//! let git1 = InstanceName::new("git1")?;
//!
//! let mut options = PersistedOptions::new();
//! options.insert("token".into(), PersistedValue::secure("ghp_xxxx"));
//! store.save(&git1, &options)?;
//!
//! assert!(store.load(&git1)?["token"].secure);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod file_store;
mod memory_store;
mod traits;

pub use file_store::FileOptionStore;
pub use memory_store::MemoryOptionStore;
pub use traits::{OptionStore, PersistedOptions, PersistedValue, StoreError};
