//! driver::source
//!
//! Where plugin documents come from.
//!
//! # Design
//!
//! The registry only needs "give me the document bytes for this driver".
//! The [`SchemaSource`] trait hides whether that is a directory checkout of
//! the contribution repository or a raw-file HTTP endpoint. Commands use
//! [`create_source`] instead of picking an implementation themselves.
//!
//! # Location Detection
//!
//! - `http://` / `https://` URLs -> [`HttpSchemaSource`]
//! - `file://` URLs and plain paths -> [`LocalSchemaSource`]
//!
//! Documents live at `<type>/<driver>/<driver>.yaml` under the location.
//!
//! # Example
//!
//! ```no_run
//! use forjj::driver::source::create_source;
//!
//! let source = create_source("https://github.com/forj-oss/forjj-contribs/raw/master")?;
//! let bytes = source.fetch("upstream", "github")?;
//! # Ok::<(), forjj::driver::source::SourceError>(())
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

/// Errors from fetching a plugin document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// No document exists for the requested driver.
    #[error("plugin document not found: {0}")]
    NotFound(String),

    /// The document exists (or may exist) but could not be read.
    #[error("failed to read plugin document '{location}': {message}")]
    ReadError { location: String, message: String },

    /// The source location or the driver request is unusable.
    #[error("invalid schema source: {0}")]
    InvalidSource(String),
}

/// Fetches raw plugin documents.
pub trait SchemaSource {
    /// Fetch the document of `driver` in category `driver_type`.
    fn fetch(&self, driver_type: &str, driver: &str) -> Result<Vec<u8>, SourceError>;

    /// Human-readable location, used in logs.
    fn location(&self) -> String;
}

/// Supported schema source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Local,
    Http,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Http => "http",
        }
    }
}

/// Path segments of a plugin document, relative to the source root.
///
/// # Errors
///
/// `SourceError::InvalidSource` when a component is empty or could escape
/// the source root.
pub fn document_segments(driver_type: &str, driver: &str) -> Result<[String; 3], SourceError> {
    for part in [driver_type, driver] {
        if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
            return Err(SourceError::InvalidSource(format!(
                "'{}' is not a valid driver type or name",
                part
            )));
        }
    }
    Ok([
        driver_type.to_string(),
        driver.to_string(),
        format!("{}.yaml", driver),
    ])
}

/// Detect which kind of source a location refers to.
///
/// # Example
///
/// ```
/// use forjj::driver::source::{detect_kind, SourceKind};
///
/// assert_eq!(detect_kind("https://example.com/contribs"), Some(SourceKind::Http));
/// assert_eq!(detect_kind("/srv/contribs"), Some(SourceKind::Local));
/// assert_eq!(detect_kind("ftp://example.com"), None);
/// ```
pub fn detect_kind(location: &str) -> Option<SourceKind> {
    if location.trim().is_empty() {
        return None;
    }
    match Url::parse(location) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Some(SourceKind::Http),
            "file" => Some(SourceKind::Local),
            _ => None,
        },
        // Relative and absolute filesystem paths do not parse as URLs.
        Err(_) => Some(SourceKind::Local),
    }
}

/// Create the schema source for a location.
///
/// # Errors
///
/// `SourceError::InvalidSource` if the location is empty or uses an
/// unsupported scheme.
pub fn create_source(location: &str) -> Result<Box<dyn SchemaSource>, SourceError> {
    match detect_kind(location) {
        Some(SourceKind::Http) => {
            let base = Url::parse(location)
                .map_err(|e| SourceError::InvalidSource(format!("{}: {}", location, e)))?;
            Ok(Box::new(HttpSchemaSource::new(base)?))
        }
        Some(SourceKind::Local) => {
            let root = match Url::parse(location) {
                Ok(url) => url.to_file_path().map_err(|_| {
                    SourceError::InvalidSource(format!("'{}' is not a local path", location))
                })?,
                Err(_) => PathBuf::from(location),
            };
            Ok(Box::new(LocalSchemaSource::new(root)))
        }
        None => Err(SourceError::InvalidSource(format!(
            "unsupported location '{}' (use a directory or an http(s) URL)",
            location
        ))),
    }
}

/// Reads plugin documents from a directory checkout.
#[derive(Debug, Clone)]
pub struct LocalSchemaSource {
    root: PathBuf,
}

impl LocalSchemaSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn document_path(&self, driver_type: &str, driver: &str) -> Result<PathBuf, SourceError> {
        let mut path = self.root.clone();
        path.extend(document_segments(driver_type, driver)?);
        Ok(path)
    }
}

impl SchemaSource for LocalSchemaSource {
    fn fetch(&self, driver_type: &str, driver: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.document_path(driver_type, driver)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
            _ => SourceError::ReadError {
                location: path.display().to_string(),
                message: e.to_string(),
            },
        })
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Fetches plugin documents over HTTP(S).
///
/// Requests are blocking from the caller's point of view; the source owns a
/// single-threaded runtime used only to drive the HTTP client.
#[derive(Debug)]
pub struct HttpSchemaSource {
    base: Url,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl HttpSchemaSource {
    /// Create a source rooted at `base`.
    ///
    /// # Errors
    ///
    /// `SourceError::InvalidSource` if the URL cannot carry a path or the
    /// HTTP client cannot be built.
    pub fn new(base: Url) -> Result<Self, SourceError> {
        if base.cannot_be_a_base() {
            return Err(SourceError::InvalidSource(format!(
                "'{}' cannot be used as a base URL",
                base
            )));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SourceError::InvalidSource(format!("cannot start runtime: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("forjj/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::InvalidSource(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            base,
            client,
            runtime,
        })
    }

    /// URL of the document for a driver.
    pub fn document_url(&self, driver_type: &str, driver: &str) -> Result<Url, SourceError> {
        let segments = document_segments(driver_type, driver)?;
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidSource(self.base.to_string()))?
            .pop_if_empty()
            .extend(&segments);
        Ok(url)
    }
}

impl SchemaSource for HttpSchemaSource {
    fn fetch(&self, driver_type: &str, driver: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.document_url(driver_type, driver)?;
        let read_error = |message: String| SourceError::ReadError {
            location: url.to_string(),
            message,
        };

        self.runtime.block_on(async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| read_error(e.to_string()))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(SourceError::NotFound(url.to_string()));
            }
            if !status.is_success() {
                return Err(read_error(format!("HTTP {}", status)));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| read_error(e.to_string()))?;
            Ok::<_, SourceError>(body.to_vec())
        })
    }

    fn location(&self) -> String {
        self.base.to_string()
    }
}
