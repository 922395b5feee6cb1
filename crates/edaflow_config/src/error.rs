//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating an `edaflow.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A referenced target name does not exist in the configuration.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// A referenced test name does not exist in the configuration.
    #[error("unknown test '{0}'")]
    UnknownTest(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A file list could not be read or contains an invalid line.
    #[error("file list {path}: {reason}")]
    FileList {
        /// The file list that failed.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },
}
