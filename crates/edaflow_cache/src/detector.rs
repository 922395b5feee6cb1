//! Change detection for incremental compilation.
//!
//! Compares each catalog file's modification time against its library's
//! last successful compile. A file is dirty if it was never compiled into the
//! library, if it is at least as new as the library state, or if it is a
//! verilog-family file whose include directories contain a header newer than
//! the library state while the library's include force flag is raised.
//!
//! The force flag is computed per library, over the include directories of
//! all its verilog-family files. A header change therefore recompiles every
//! verilog-family file of the library that declares the changed directory,
//! whether or not it includes the header.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use edaflow_common::{merge_unique, mtime, SourceFile};
use tracing::debug;

use crate::library::LibraryBuildState;

/// Compile decision for one library.
#[derive(Debug, Clone)]
pub struct LibraryPlan<'a> {
    /// Persisted state loaded for the library.
    pub state: LibraryBuildState,
    /// The library's files, in catalog order.
    pub files: Vec<&'a SourceFile>,
    /// Parallel to `files`: whether each file needs compiling.
    pub needs_compile: Vec<bool>,
    /// Whether a header in a verilog-family include directory changed.
    pub force: bool,
}

impl LibraryPlan<'_> {
    /// Returns `true` if no file of the library needs compiling.
    pub fn is_up_to_date(&self) -> bool {
        !self.needs_compile.iter().any(|&dirty| dirty)
    }

    /// Number of files that need compiling.
    pub fn dirty_count(&self) -> usize {
        self.needs_compile.iter().filter(|&&dirty| dirty).count()
    }
}

/// Builds a compile plan for every library referenced by `catalog`.
///
/// Libraries are returned in order of first appearance in the catalog, and
/// files keep their catalog order within a library. `shared_incdirs` are the
/// global and target include directories, declared by every verilog-family
/// file in addition to its own.
pub fn detect_changes<'a>(
    catalog: &'a [SourceFile],
    build_dir: &Path,
    shared_incdirs: &[PathBuf],
) -> Vec<LibraryPlan<'a>> {
    let mut grouped: Vec<(&str, Vec<&'a SourceFile>)> = Vec::new();
    for file in catalog {
        match grouped.iter_mut().find(|(lib, _)| *lib == file.library) {
            Some((_, files)) => files.push(file),
            None => grouped.push((&file.library, vec![file])),
        }
    }

    grouped
        .into_iter()
        .map(|(library, files)| plan_library(library, files, build_dir, shared_incdirs))
        .collect()
}

fn plan_library<'a>(
    library: &str,
    files: Vec<&'a SourceFile>,
    build_dir: &Path,
    shared_incdirs: &[PathBuf],
) -> LibraryPlan<'a> {
    let mut state = LibraryBuildState::load(build_dir, library);
    state.hdl_only = !files.iter().any(|f| f.is_verilog_family());
    let since = state.timestamp;

    let declared: Vec<Vec<PathBuf>> = files
        .iter()
        .map(|f| {
            if f.is_verilog_family() {
                merge_unique(&[shared_incdirs, f.incdirs.as_slice()])
            } else {
                Vec::new()
            }
        })
        .collect();

    let mut scanned = IncludeScan::new(since);
    let force = !state.hdl_only
        && declared
            .iter()
            .flatten()
            .any(|dir| scanned.has_newer(dir));

    let needs_compile: Vec<bool> = files
        .iter()
        .zip(&declared)
        .map(|(file, incdirs)| {
            let dirty = !state.contains(&file.path)
                || mtime::at_or_after(file.modified, since)
                || (force && incdirs.iter().any(|dir| scanned.has_newer(dir)));
            if dirty {
                debug!(library, file = %file.path.display(), "needs compile");
            }
            dirty
        })
        .collect();

    debug!(
        library,
        force,
        dirty = needs_compile.iter().filter(|&&d| d).count(),
        total = files.len(),
        "library change detection"
    );

    LibraryPlan {
        state,
        files,
        needs_compile,
        force,
    }
}

/// Memoized include directory scans against one reference time.
struct IncludeScan {
    since: SystemTime,
    seen: HashMap<PathBuf, bool>,
}

impl IncludeScan {
    fn new(since: SystemTime) -> Self {
        Self {
            since,
            seen: HashMap::new(),
        }
    }

    fn has_newer(&mut self, dir: &Path) -> bool {
        if let Some(&newer) = self.seen.get(dir) {
            return newer;
        }
        let newer = mtime::dir_has_newer(dir, self.since);
        self.seen.insert(dir.to_path_buf(), newer);
        newer
    }
}
