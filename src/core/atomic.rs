//! core::atomic
//!
//! Atomic file replacement used by every on-disk store.
//!
//! Writes go to a sibling temp file which is synced and then renamed over
//! the target, so readers never observe a half-written file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Write `contents` to `path` atomically.
///
/// Parent directories are created as needed. When `private` is set the
/// file is created with 0600 permissions on Unix before any content is
/// written.
pub fn write_atomic(path: &Path, contents: &[u8], private: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.tmp", ext.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        #[cfg(unix)]
        if private {
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        #[cfg(not(unix))]
        let _ = private;

        file.write_all(contents)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)
}
