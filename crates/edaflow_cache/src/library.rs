//! Per-library record of compiled source files.
//!
//! Each library keeps `compiled_files.json` in its build directory: a JSON
//! array of the absolute paths compiled into it so far. There is no stored
//! timestamp. The file's own modification time is the time of the library's
//! last successful compile, and every successful compile rewrites the file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use edaflow_common::mtime;
use tracing::{debug, warn};

use crate::error::CacheError;

/// Name of the persisted state file inside a library build directory.
pub const STATE_FILE: &str = "compiled_files.json";

/// Subdirectory of the build directory that holds library work directories.
const LIBS_SUBDIR: &str = "libs";

/// Persisted compile state of one library.
#[derive(Debug, Clone)]
pub struct LibraryBuildState {
    /// Library name.
    pub name: String,
    /// The library's build (work) directory.
    pub dir: PathBuf,
    /// Absolute paths compiled into the library by earlier runs.
    pub compiled: BTreeSet<PathBuf>,
    /// Modification time of the state file; [`mtime::NEVER`] when absent.
    pub timestamp: SystemTime,
    /// `true` when the library has no verilog-family sources, in which case
    /// include directories are never scanned for it.
    pub hdl_only: bool,
}

impl LibraryBuildState {
    /// Returns the build directory of library `name` under `build_dir`.
    pub fn library_dir(build_dir: &Path, name: &str) -> PathBuf {
        build_dir.join(LIBS_SUBDIR).join(name)
    }

    /// Loads the state of library `name`.
    ///
    /// This is fail-safe: a missing or corrupt state file yields an empty set
    /// with a zero timestamp, so every file of the library is rebuilt.
    pub fn load(build_dir: &Path, name: &str) -> Self {
        let dir = Self::library_dir(build_dir, name);
        let path = dir.join(STATE_FILE);
        let (compiled, timestamp) = match read_state(&path) {
            Some(set) => (set, mtime::modified(&path).unwrap_or(mtime::NEVER)),
            None => (BTreeSet::new(), mtime::NEVER),
        };
        debug!(
            library = name,
            files = compiled.len(),
            "loaded library state"
        );
        Self {
            name: name.to_string(),
            dir,
            compiled,
            timestamp,
            hdl_only: false,
        }
    }

    /// Returns the time of the library's last successful compile, if any.
    ///
    /// Only the state file's timestamp is read.
    pub fn last_compiled(build_dir: &Path, name: &str) -> Option<SystemTime> {
        mtime::modified(&Self::library_dir(build_dir, name).join(STATE_FILE))
    }

    /// Path of the persisted state file.
    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    /// Returns `true` if `path` was compiled into this library before.
    pub fn contains(&self, path: &Path) -> bool {
        self.compiled.contains(path)
    }

    /// Adds `paths` to the recorded set and rewrites the state file, which
    /// moves the library's timestamp to now.
    ///
    /// Paths already recorded stay recorded; the set only grows.
    pub fn merge_and_save<I>(&mut self, paths: I) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.compiled.extend(paths);
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::io(&self.dir, e))?;
        let path = self.state_path();
        let json = serde_json::to_string_pretty(&self.compiled).map_err(|e| {
            CacheError::Serialization {
                reason: e.to_string(),
            }
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(&path, e))?;
        self.timestamp = mtime::modified(&path).unwrap_or_else(SystemTime::now);
        Ok(())
    }
}

fn read_state(path: &Path) -> Option<BTreeSet<PathBuf>> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt library state");
            None
        }
    }
}
