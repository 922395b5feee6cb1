//! Single test runs and the regression runner.
//!
//! Compilation and elaboration are sequential; they are the only phases that
//! write library state and elaboration markers. Simulations of the
//! elaborated tests then run concurrently on a rayon pool. Each test's
//! verdict is read back from the `SIM` trailer of its log.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use edaflow_config::{resolve_target, resolve_test, FlowConfig, ResolvedTarget, TestRunSpec};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::compile::compile_target;
use crate::context::FlowContext;
use crate::elaborate::{elaborate, ElabOutcome};
use crate::error::FlowError;
use crate::simulate::{simulate, SimOutcome};
use crate::trailer::{LogTrailer, Step};

/// Verdict for one test, derived from its simulation trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// The simulator exited with code 0.
    Passed,
    /// The simulator exited with the given nonzero code.
    Failed(i32),
    /// The log has no readable trailer.
    Unknown,
}

impl TestStatus {
    /// Derives a verdict from a parsed trailer.
    pub fn from_trailer(trailer: Option<LogTrailer>) -> Self {
        match trailer {
            Some(t) if t.exit_code == 0 => TestStatus::Passed,
            Some(t) => TestStatus::Failed(t.exit_code),
            None => TestStatus::Unknown,
        }
    }

    /// Process exit code for this verdict.
    pub fn exit_code(self) -> i32 {
        match self {
            TestStatus::Passed => 0,
            TestStatus::Failed(code) => code,
            TestStatus::Unknown => 1,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed(code) => write!(f, "FAIL (exit {code})"),
            TestStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome of one test in a regression.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Test name.
    pub test: String,
    /// Verdict from the simulation trailer.
    pub status: TestStatus,
    /// Whether elaboration was reused.
    pub elab_reused: bool,
    /// Simulation run time in seconds, if known.
    pub run_time: Option<f64>,
    /// The simulation log.
    pub log: PathBuf,
}

/// All results of a regression, in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionSummary {
    /// One result per test.
    pub results: Vec<TestResult>,
}

impl RegressionSummary {
    /// Number of tests with the given verdict kind.
    fn count(&self, pred: impl Fn(TestStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(r.status)).count()
    }

    /// Number of passing tests.
    pub fn passed(&self) -> usize {
        self.count(|s| s == TestStatus::Passed)
    }

    /// Number of failing tests.
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TestStatus::Failed(_)))
    }

    /// Number of tests without a readable verdict.
    pub fn unknown(&self) -> usize {
        self.count(|s| s == TestStatus::Unknown)
    }

    /// Returns `true` if every test passed.
    pub fn all_passed(&self) -> bool {
        self.passed() == self.results.len()
    }
}

/// Names of the configured tests containing `filter`, in name order.
pub fn select_tests(config: &FlowConfig, filter: Option<&str>) -> Vec<String> {
    config
        .tests
        .keys()
        .filter(|name| filter.map_or(true, |f| name.contains(f)))
        .cloned()
        .collect()
}

/// Compiles, elaborates and simulates one test.
pub fn run_test(ctx: &FlowContext, test_name: &str) -> Result<(ElabOutcome, SimOutcome), FlowError> {
    let test = resolve_test(&ctx.config, test_name)?;
    let target = resolve_target(&ctx.config, &ctx.root, &test.target)?;
    compile_target(ctx, &target)?;
    let elab = elaborate(ctx, &target, &test)?;
    let sim = simulate(ctx, &target, &test, &elab)?;
    Ok((elab, sim))
}

/// Runs `tests`, simulating on up to `jobs` threads (`0` means one per CPU).
///
/// Every target is compiled once, before any elaboration. A compile or
/// elaboration failure stops the regression; a failing simulation does not.
pub fn run_regression(
    ctx: &FlowContext,
    tests: &[String],
    jobs: usize,
) -> Result<RegressionSummary, FlowError> {
    let specs: Vec<TestRunSpec> = tests
        .iter()
        .map(|name| resolve_test(&ctx.config, name))
        .collect::<Result<_, _>>()?;

    let mut targets: BTreeMap<String, ResolvedTarget> = BTreeMap::new();
    for spec in &specs {
        if targets.contains_key(&spec.target) {
            continue;
        }
        let target = resolve_target(&ctx.config, &ctx.root, &spec.target)?;
        compile_target(ctx, &target)?;
        targets.insert(spec.target.clone(), target);
    }

    let mut elaborated = Vec::with_capacity(specs.len());
    for spec in &specs {
        let elab = elaborate(ctx, &targets[&spec.target], spec)?;
        elaborated.push((spec, elab));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| FlowError::WorkerPool(e.to_string()))?;
    info!(tests = elaborated.len(), threads = pool.current_num_threads(), "simulating");
    let outcomes: Vec<Result<SimOutcome, FlowError>> = pool.install(|| {
        elaborated
            .par_iter()
            .map(|(spec, elab)| simulate(ctx, &targets[&spec.target], spec, elab))
            .collect()
    });

    let mut summary = RegressionSummary::default();
    for ((_, elab), outcome) in elaborated.iter().zip(outcomes) {
        let sim = outcome?;
        let trailer = LogTrailer::read(&sim.log, Step::Sim);
        if trailer.is_none() {
            warn!(test = %sim.test, log = %sim.log.display(), "no simulation trailer");
        }
        summary.results.push(TestResult {
            test: sim.test,
            status: TestStatus::from_trailer(trailer),
            elab_reused: elab.reused,
            run_time: trailer.map(|t| t.run_time),
            log: sim.log,
        });
    }
    Ok(summary)
}
