//! driver::mock
//!
//! In-memory schema source for deterministic testing.
//!
//! # Example
//!
//! ```
//! use forjj::driver::mock::MemorySchemaSource;
//! use forjj::driver::source::{SchemaSource, SourceError};
//!
//! let source = MemorySchemaSource::new()
//!     .with_document("upstream", "github", "plugin: github\n")
//!     .with_failure("ci", "jenkins", SourceError::NotFound("ci/jenkins".into()));
//!
//! assert!(source.fetch("upstream", "github").is_ok());
//! assert!(source.fetch("ci", "jenkins").is_err());
//! assert_eq!(source.fetch_count("upstream", "github"), 1);
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use super::source::{SchemaSource, SourceError};

type Key = (String, String);

/// Schema source backed by a map of documents.
///
/// Unknown drivers are reported as `SourceError::NotFound`. Every fetch is
/// recorded so tests can assert how often a document was requested.
#[derive(Debug, Default)]
pub struct MemorySchemaSource {
    documents: HashMap<Key, Result<Vec<u8>, SourceError>>,
    fetches: Mutex<Vec<Key>>,
}

impl MemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for `driver_type/driver`.
    pub fn with_document(
        mut self,
        driver_type: &str,
        driver: &str,
        document: impl Into<Vec<u8>>,
    ) -> Self {
        self.documents
            .insert(key(driver_type, driver), Ok(document.into()));
        self
    }

    /// Fail fetches of `driver_type/driver` with `error`.
    pub fn with_failure(mut self, driver_type: &str, driver: &str, error: SourceError) -> Self {
        self.documents.insert(key(driver_type, driver), Err(error));
        self
    }

    /// How many times a document was fetched.
    pub fn fetch_count(&self, driver_type: &str, driver: &str) -> usize {
        let wanted = key(driver_type, driver);
        self.fetches
            .lock()
            .map(|log| log.iter().filter(|k| **k == wanted).count())
            .unwrap_or(0)
    }
}

fn key(driver_type: &str, driver: &str) -> Key {
    (driver_type.to_string(), driver.to_string())
}

impl SchemaSource for MemorySchemaSource {
    fn fetch(&self, driver_type: &str, driver: &str) -> Result<Vec<u8>, SourceError> {
        let wanted = key(driver_type, driver);
        if let Ok(mut log) = self.fetches.lock() {
            log.push(wanted.clone());
        }

        match self.documents.get(&wanted) {
            Some(result) => result.clone(),
            None => Err(SourceError::NotFound(format!("{}/{}", driver_type, driver))),
        }
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
