//! `edaflow regress`: run a set of tests with concurrent simulation.

use edaflow_flow::{run_regression, select_tests, CancelToken, TestResult};

use crate::pipeline::flow_context;
use crate::{GlobalArgs, RegressArgs};

/// Runs the `edaflow regress` command.
///
/// Returns exit code 0 only if every selected test passed.
pub fn run(
    args: &RegressArgs,
    global: &GlobalArgs,
    cancel: &CancelToken,
) -> Result<i32, Box<dyn std::error::Error>> {
    let ctx = flow_context(global, cancel)?;
    let tests = select_tests(&ctx.config, args.filter.as_deref());
    if tests.is_empty() {
        if !global.quiet {
            eprintln!("warning: no tests match the given filter");
        }
        return Ok(0);
    }

    if !global.quiet {
        eprintln!(
            "   Regressing {} ({} test(s))",
            ctx.config.project.name,
            tests.len()
        );
    }
    let summary = run_regression(&ctx, &tests, args.jobs)?;

    if !global.quiet {
        for result in &summary.results {
            print_result(result);
        }
        eprintln!();
        eprintln!(
            "   Result: {} passed, {} failed, {} unknown out of {} test(s)",
            summary.passed(),
            summary.failed(),
            summary.unknown(),
            summary.results.len()
        );
    }

    Ok(if summary.all_passed() { 0 } else { 1 })
}

fn print_result(result: &TestResult) {
    let time = result
        .run_time
        .map(|t| format!(" ({t:.2}s)"))
        .unwrap_or_default();
    let reused = if result.elab_reused { ", elaboration reused" } else { "" };
    eprintln!("   {} {}{time}{reused}", result.status, result.test);
}
