//! The edaflow tool flow: incremental compilation, elaboration reuse and
//! simulation runs.
//!
//! Every step takes an immutable [`FlowContext`] and a resolved target. The
//! compile step synthesizes one command per source file, batches consecutive
//! identical commands and runs only the batches that hold changed files.
//! Elaboration is keyed by its exact command text and reused while no
//! dependent library has been recompiled. External tools run through a
//! [`ProcessRunner`] that merges their output into logs and terminates the
//! whole process group on interruption.

#![warn(missing_docs)]

pub mod command;
pub mod compile;
pub mod context;
pub mod elaborate;
pub mod error;
pub mod process;
pub mod regress;
pub mod simulate;
pub mod trailer;

pub use command::{shell_quote, CommandSynthesizer, CompileBatch};
pub use compile::{compile_target, CompileReport, LibraryReport};
pub use context::{FlowContext, COMPILE_LOG};
pub use elaborate::{elab_command, elaborate, quote_generic, ElabOutcome, ELAB_LOG};
pub use error::FlowError;
pub use process::{CancelToken, ProcessOutcome, ProcessRunner};
pub use regress::{run_regression, run_test, select_tests, RegressionSummary, TestResult, TestStatus};
pub use simulate::{sim_command, simulate, SimOutcome, ELAB_DIR_ENV, SIM_LOG};
pub use trailer::{LogTrailer, Step};
