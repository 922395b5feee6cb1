//! Error types for the compile, elaborate and simulate flow.

use std::path::PathBuf;

use edaflow_cache::CacheError;
use edaflow_common::HdlLanguage;
use edaflow_config::ConfigError;

/// Fatal errors that stop a flow invocation.
///
/// A simulation that exits nonzero is not an error; its outcome is recorded
/// in the log trailer instead.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// The configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache state could not be written, or no elaboration slot is free.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// No compiler front-end is configured for a source file's language.
    #[error("no {language} compiler configured (needed for {})", file.display())]
    MissingFrontEnd {
        /// The language without a front-end.
        language: HdlLanguage,
        /// The first file that needed it.
        file: PathBuf,
    },

    /// A required tool command is not configured.
    #[error("no {tool} command configured in [tools]")]
    MissingTool {
        /// The `[tools]` key that is missing.
        tool: &'static str,
    },

    /// An I/O error on a log or working directory.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A command could not be started, or its output could not be read.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The command text.
        command: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The framework bootstrap command exited nonzero.
    #[error("framework bootstrap failed with exit code {code}: `{command}` (see {})", log.display())]
    FrameworkFailed {
        /// The command text.
        command: String,
        /// The exit code.
        code: i32,
        /// The compile log holding the tool output.
        log: PathBuf,
    },

    /// A compile batch exited nonzero.
    #[error("compilation of library '{library}' failed with exit code {code}: `{command}` (see {})", log.display())]
    CompileFailed {
        /// The library being compiled.
        library: String,
        /// The full invocation, including the file list.
        command: String,
        /// The exit code.
        code: i32,
        /// The compile log holding the tool output.
        log: PathBuf,
    },

    /// The elaborator exited nonzero.
    #[error("elaboration of test '{test}' failed with exit code {code}: `{command}` (see {})", log.display())]
    ElaborationFailed {
        /// The test being elaborated.
        test: String,
        /// The elaboration command.
        command: String,
        /// The exit code.
        code: i32,
        /// The elaboration log.
        log: PathBuf,
    },

    /// The run was interrupted while a command was executing.
    #[error("interrupted while running `{command}`")]
    Interrupted {
        /// The command that was running.
        command: String,
    },

    /// The simulation worker pool could not be created.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl FlowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowError::Io {
            path: path.into(),
            source,
        }
    }
}
