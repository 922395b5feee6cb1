//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reads are fail-safe: unreadable state results in a cache miss rather than
/// an error. Only writes and directory allocation can fail.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization error occurred while writing library state.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Every elaboration directory slot for a target and test is taken.
    #[error("elaboration directory limit exceeded: {limit} directories named {prefix}NNN already exist")]
    DirectoryLimit {
        /// The directory name prefix, e.g. `elab_tb_smoke_`.
        prefix: String,
        /// The configured limit.
        limit: usize,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
