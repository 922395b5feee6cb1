//! Elaboration directories and their command-text markers.
//!
//! Each elaboration runs in its own directory under `<build>/elab`, named
//! `elab_<target>_<test>_<NNN>`. After a successful elaboration the verbatim
//! command text is written to the directory's marker file; the marker's
//! modification time is the record's creation time. A directory without a
//! readable marker holds nothing reusable and may be reallocated.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use edaflow_common::mtime;
use tracing::debug;

use crate::error::CacheError;

/// Name of the marker file inside an elaboration directory.
pub const MARKER_FILE: &str = "elab.cmd";

/// Subdirectory of the build directory that holds elaboration directories.
const ELAB_SUBDIR: &str = "elab";

/// Name prefix shared by all elaboration directories.
const DIR_PREFIX: &str = "elab_";

/// A previously elaborated directory, identified by its command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElaborationRecord {
    /// The elaboration directory.
    pub dir: PathBuf,
    /// Verbatim command text that produced it.
    pub command: String,
    /// Modification time of the marker file.
    pub created: SystemTime,
}

impl ElaborationRecord {
    /// Returns the name of the first library compiled after this record was
    /// created, if any.
    ///
    /// `libraries` pairs each dependent library with its last compile time.
    /// A library that was never compiled cannot invalidate the record.
    pub fn stale_library<'a>(&self, libraries: &[(&'a str, Option<SystemTime>)]) -> Option<&'a str> {
        libraries
            .iter()
            .find(|(_, compiled)| mtime::newer_than(*compiled, self.created))
            .map(|(name, _)| *name)
    }
}

/// The set of elaboration directories under one build directory.
#[derive(Debug, Clone)]
pub struct ElabStore {
    root: PathBuf,
    limit: usize,
}

impl ElabStore {
    /// Creates a store rooted at `<build_dir>/elab` allowing `limit`
    /// directories per target and test.
    pub fn new(build_dir: &Path, limit: usize) -> Self {
        Self {
            root: build_dir.join(ELAB_SUBDIR),
            limit,
        }
    }

    /// Directory that holds all elaboration directories.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic name of slot `index` for a target and test.
    pub fn dir_name(target: &str, test: &str, index: usize) -> String {
        format!("{}{index:03}", slot_prefix(target, test))
    }

    /// Reads the slots of `target` that carry a readable marker, sorted by
    /// directory name.
    ///
    /// `tests` names the target's tests; only `elab_<target>_<test>_<NNN>`
    /// directories of those tests belong to the target. Unreadable
    /// directories and markers are skipped.
    pub fn records(&self, target: &str, tests: &[&str]) -> Vec<ElaborationRecord> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut records: Vec<ElaborationRecord> = entries
            .flatten()
            .filter(|e| owns_slot(&e.file_name().to_string_lossy(), target, tests))
            .filter_map(|e| read_record(&e.path()))
            .collect();
        records.sort_by(|a, b| a.dir.cmp(&b.dir));
        records
    }

    /// Finds the record of `target` whose command text is byte-identical to
    /// `command`.
    ///
    /// Directories of other targets never match: the command text does not
    /// name the libraries the design was linked from.
    pub fn find(&self, target: &str, tests: &[&str], command: &str) -> Option<ElaborationRecord> {
        let found = self
            .records(target, tests)
            .into_iter()
            .find(|r| r.command == command);
        if let Some(record) = &found {
            debug!(dir = %record.dir.display(), "found elaboration with identical command");
        }
        found
    }

    /// Returns the first slot for `target` and `test` that is free: either
    /// the directory does not exist or it has no readable marker.
    ///
    /// Fails when all `limit` slots hold a marked elaboration.
    pub fn allocate(&self, target: &str, test: &str) -> Result<PathBuf, CacheError> {
        (0..self.limit)
            .map(|idx| self.root.join(Self::dir_name(target, test, idx)))
            .find(|dir| !dir.exists() || read_record(dir).is_none())
            .ok_or_else(|| CacheError::DirectoryLimit {
                prefix: slot_prefix(target, test),
                limit: self.limit,
            })
    }

    /// Clears `dir` and recreates it empty.
    pub fn prepare(dir: &Path) -> Result<(), CacheError> {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;
        }
        std::fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))
    }

    /// Writes the marker for a successful elaboration in `dir`.
    pub fn write_marker(dir: &Path, command: &str) -> Result<ElaborationRecord, CacheError> {
        let path = dir.join(MARKER_FILE);
        std::fs::write(&path, command).map_err(|e| CacheError::io(&path, e))?;
        Ok(ElaborationRecord {
            dir: dir.to_path_buf(),
            command: command.to_string(),
            created: mtime::modified(&path).unwrap_or_else(SystemTime::now),
        })
    }
}

fn slot_prefix(target: &str, test: &str) -> String {
    format!("{DIR_PREFIX}{target}_{test}_")
}

/// `elab_tb_x_t_000` is test `x_t` of `tb` or test `t` of `tb_x`; the test
/// names decide.
fn owns_slot(name: &str, target: &str, tests: &[&str]) -> bool {
    tests.iter().any(|test| {
        name.strip_prefix(&slot_prefix(target, test))
            .is_some_and(|index| index.len() >= 3 && index.bytes().all(|b| b.is_ascii_digit()))
    })
}

fn read_record(dir: &Path) -> Option<ElaborationRecord> {
    let marker = dir.join(MARKER_FILE);
    let command = std::fs::read_to_string(&marker).ok()?;
    let created = mtime::modified(&marker)?;
    Some(ElaborationRecord {
        dir: dir.to_path_buf(),
        command,
        created,
    })
}
