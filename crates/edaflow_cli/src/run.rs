//! `edaflow run`: compile, elaborate and simulate one test.

use edaflow_flow::{run_test, CancelToken, LogTrailer, Step, TestStatus};

use crate::pipeline::flow_context;
use crate::{GlobalArgs, RunArgs};

/// Runs the `edaflow run` command.
///
/// The exit code is the simulator's, as recorded in the log trailer.
pub fn run(
    args: &RunArgs,
    global: &GlobalArgs,
    cancel: &CancelToken,
) -> Result<i32, Box<dyn std::error::Error>> {
    let ctx = flow_context(global, cancel)?;
    if !global.quiet {
        eprintln!("     Running {}", args.test);
    }
    let (elab, sim) = run_test(&ctx, &args.test)?;
    let status = TestStatus::from_trailer(LogTrailer::read(&sim.log, Step::Sim));
    if !global.quiet {
        crate::elab::print_outcome(&elab);
        eprintln!(
            "      Result: {status} in {:.2}s (log: {})",
            sim.trailer.run_time,
            sim.log.display()
        );
    }
    Ok(status.exit_code())
}
