//! Filesystem helpers shared by producers and the consumer.
//!
//! The queue is coordinated without locks, so every write goes through
//! [`write_atomic`] and every delete through [`remove_if_present`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Suffix appended to a path while it is being written
pub const TEMP_SUFFIX: &str = ".tmp";

/// The in-flight sibling of `path` (`foo.json` -> `foo.json.tmp`)
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

pub fn is_temp_file(path: &Path) -> bool {
    path.to_string_lossy().ends_with(TEMP_SUFFIX)
}

/// Write `contents` to `path` so readers only ever see the complete file.
///
/// Writes the `.tmp` sibling first and renames it over the target. On Unix
/// the rename is atomic; the temp file is removed if the rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, contents)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

/// Delete a file, treating "already gone" as success.
///
/// Returns whether this call removed the file.
pub fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// How long ago `modified` was, saturating at zero for clock skew
pub fn age_of(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}
