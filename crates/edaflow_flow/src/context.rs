//! The immutable context every flow step receives.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use edaflow_config::FlowConfig;

use crate::process::ProcessRunner;

/// Name of the cumulative compile log under the build directory.
pub const COMPILE_LOG: &str = "compile.log";

/// Subdirectory of the build directory holding per-test run directories.
const RUNS_SUBDIR: &str = "runs";

/// Configuration, locations and process runner for one flow invocation.
///
/// Built once by the caller and passed by reference to each step; no step
/// reads configuration from anywhere else.
#[derive(Debug, Clone)]
pub struct FlowContext {
    /// The loaded project configuration.
    pub config: FlowConfig,
    /// Project root; relative configuration paths resolve against it.
    pub root: PathBuf,
    /// Absolute build directory.
    pub build_dir: PathBuf,
    /// Runner shared by every external command.
    pub runner: ProcessRunner,
    /// Options appended last to every compile command.
    pub compile_overrides: Vec<String>,
    /// Options appended to the elaboration command before the top unit.
    pub elab_overrides: Vec<String>,
    framework_done: Arc<AtomicBool>,
}

impl FlowContext {
    /// Creates a context for the project rooted at `root`.
    pub fn new(config: FlowConfig, root: impl Into<PathBuf>, runner: ProcessRunner) -> Self {
        let root = root.into();
        let build_dir = config.build_dir(&root);
        Self {
            config,
            root,
            build_dir,
            runner,
            compile_overrides: Vec::new(),
            elab_overrides: Vec::new(),
            framework_done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the command-line compile overrides.
    pub fn with_compile_overrides(mut self, overrides: Vec<String>) -> Self {
        self.compile_overrides = overrides;
        self
    }

    /// Sets the command-line elaboration overrides.
    pub fn with_elab_overrides(mut self, overrides: Vec<String>) -> Self {
        self.elab_overrides = overrides;
        self
    }

    /// Whether the framework bootstrap already succeeded in this invocation.
    ///
    /// Clones of a context share the flag.
    pub fn framework_done(&self) -> bool {
        self.framework_done.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_framework_done(&self) {
        self.framework_done.store(true, Ordering::SeqCst);
    }

    /// Path of the cumulative compile log.
    pub fn compile_log(&self) -> PathBuf {
        self.build_dir.join(COMPILE_LOG)
    }

    /// Directory holding the logs and working files of one test run.
    pub fn run_dir(&self, target: &str, test: &str) -> PathBuf {
        self.build_dir.join(RUNS_SUBDIR).join(target).join(test)
    }
}
