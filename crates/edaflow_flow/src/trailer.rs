//! Machine-readable result lines appended to elaboration and simulation logs.
//!
//! A finished step appends exactly two lines to its log:
//!
//! ```text
//! TS_SIM_RUN_EXIT_CODE: 0
//! TS_SIM_RUN_TIME: 12.345
//! ```
//!
//! Downstream checkers read the outcome back with [`LogTrailer::parse`]; a log
//! without a complete trailer has no known outcome.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::FlowError;

/// The flow step a trailer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Elaboration.
    Elab,
    /// Simulation.
    Sim,
}

impl Step {
    /// The tag used in trailer line keys.
    pub fn tag(self) -> &'static str {
        match self {
            Step::Elab => "ELAB",
            Step::Sim => "SIM",
        }
    }
}

/// Exit code and run time of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogTrailer {
    /// The step that ran.
    pub step: Step,
    /// The step's exit code.
    pub exit_code: i32,
    /// Run time in seconds.
    pub run_time: f64,
}

impl LogTrailer {
    /// Creates a trailer from an exit code and elapsed time.
    pub fn new(step: Step, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            step,
            exit_code,
            run_time: elapsed.as_secs_f64(),
        }
    }

    /// Appends the trailer lines to the log at `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<(), FlowError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FlowError::io(path, e))?;
        file.write_all(self.to_string().as_bytes())
            .map_err(|e| FlowError::io(path, e))
    }

    /// Reads the trailer for `step` from log text.
    ///
    /// The last occurrence of each key wins. Returns `None` when either line
    /// is missing or its value does not parse.
    pub fn parse(text: &str, step: Step) -> Option<Self> {
        let code_key = format!("TS_{}_RUN_EXIT_CODE:", step.tag());
        let time_key = format!("TS_{}_RUN_TIME:", step.tag());
        let mut exit_code = None;
        let mut run_time = None;
        for line in text.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix(&code_key) {
                exit_code = value.trim().parse::<i32>().ok();
            } else if let Some(value) = line.strip_prefix(&time_key) {
                run_time = value.trim().parse::<f64>().ok();
            }
        }
        Some(Self {
            step,
            exit_code: exit_code?,
            run_time: run_time?,
        })
    }

    /// Reads the trailer for `step` from the log at `path`.
    ///
    /// An unreadable log has no trailer.
    pub fn read(path: &Path, step: Step) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        Self::parse(&String::from_utf8_lossy(&bytes), step)
    }
}

impl fmt::Display for LogTrailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.step.tag();
        writeln!(f, "TS_{tag}_RUN_EXIT_CODE: {}", self.exit_code)?;
        writeln!(f, "TS_{tag}_RUN_TIME: {:.3}", self.run_time)
    }
}
