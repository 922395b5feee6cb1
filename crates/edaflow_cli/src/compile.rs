//! `edaflow compile`: incremental compilation of one target.

use std::time::Instant;

use edaflow_config::resolve_target;
use edaflow_flow::{compile_target, CancelToken, CompileReport};

use crate::pipeline::{flow_context, pick_target};
use crate::{CompileArgs, GlobalArgs};

/// Runs the `edaflow compile` command.
pub fn run(
    args: &CompileArgs,
    global: &GlobalArgs,
    cancel: &CancelToken,
) -> Result<i32, Box<dyn std::error::Error>> {
    let ctx = flow_context(global, cancel)?.with_compile_overrides(args.opt.clone());
    let target_name = pick_target(&ctx.config, args.target.as_deref())?;
    let target = resolve_target(&ctx.config, &ctx.root, &target_name)?;

    if !global.quiet {
        eprintln!(
            "   Compiling {} (target {target_name}, {} files)",
            ctx.config.project.name,
            target.catalog.len()
        );
    }
    let start = Instant::now();
    let report = compile_target(&ctx, &target)?;
    if !global.quiet {
        print_report(&report);
        eprintln!(
            "    Finished compile in {:.2}s",
            start.elapsed().as_secs_f64()
        );
    }
    Ok(0)
}

/// Prints one status line per library.
pub fn print_report(report: &CompileReport) {
    for lib in &report.libraries {
        if lib.is_up_to_date() {
            eprintln!("       Fresh {}", lib.library);
        } else {
            eprintln!(
                "    Compiled {} ({} file(s), {} invocation(s))",
                lib.library, lib.files_compiled, lib.invocations
            );
        }
    }
}
