//! Filesystem modification-time queries and comparisons.
//!
//! Every freshness decision in the compile and elaboration caches goes
//! through these functions. A missing or unreadable timestamp is `None`;
//! the comparison helpers resolve `None` towards rebuilding.

use std::path::Path;
use std::time::SystemTime;

/// The timestamp used for state that was never written.
pub const NEVER: SystemTime = SystemTime::UNIX_EPOCH;

/// Returns the modification time of `path`, or `None` if it cannot be read.
pub fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Returns `true` if `time` is at or after `reference`.
///
/// An unknown `time` counts as fresh, so the caller rebuilds.
pub fn at_or_after(time: Option<SystemTime>, reference: SystemTime) -> bool {
    time.map_or(true, |t| t >= reference)
}

/// Returns `true` if `time` is strictly after `reference`.
///
/// An unknown `time` is never newer.
pub fn newer_than(time: Option<SystemTime>, reference: SystemTime) -> bool {
    time.is_some_and(|t| t > reference)
}

/// Returns `true` if any regular file directly inside `dir` was modified
/// strictly after `reference`.
///
/// Subdirectories are not descended. A missing directory has no newer files.
pub fn dir_has_newer(dir: &Path, reference: SystemTime) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry
            .metadata()
            .ok()
            .filter(|m| m.is_file())
            .and_then(|m| m.modified().ok())
            .is_some_and(|t| t > reference)
    })
}
