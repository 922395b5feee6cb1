//! Incremental compilation and elaboration cache state.
//!
//! This crate owns everything the flow persists between invocations: the
//! per-library record of compiled files (whose own modification time is the
//! library's last successful compile), the change detector that compares
//! source timestamps against it, and the elaboration directories recognised by
//! the verbatim command text that built them.

#![warn(missing_docs)]

pub mod detector;
pub mod elab;
pub mod error;
pub mod library;

pub use detector::{detect_changes, LibraryPlan};
pub use elab::{ElabStore, ElaborationRecord, MARKER_FILE};
pub use error::CacheError;
pub use library::{LibraryBuildState, STATE_FILE};
