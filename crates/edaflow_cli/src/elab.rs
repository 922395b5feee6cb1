//! `edaflow elab`: compile and elaborate one test.

use edaflow_config::{resolve_target, resolve_test};
use edaflow_flow::{compile_target, elaborate, CancelToken, ElabOutcome};

use crate::pipeline::flow_context;
use crate::{ElabArgs, GlobalArgs};

/// Runs the `edaflow elab` command.
pub fn run(
    args: &ElabArgs,
    global: &GlobalArgs,
    cancel: &CancelToken,
) -> Result<i32, Box<dyn std::error::Error>> {
    let ctx = flow_context(global, cancel)?.with_elab_overrides(args.opt.clone());
    let test = resolve_test(&ctx.config, &args.test)?;
    let target = resolve_target(&ctx.config, &ctx.root, &test.target)?;

    if !global.quiet {
        eprintln!("   Compiling target {}", target.name);
    }
    let report = compile_target(&ctx, &target)?;
    if !global.quiet {
        crate::compile::print_report(&report);
        eprintln!(" Elaborating {}", test.name);
    }
    let outcome = elaborate(&ctx, &target, &test)?;
    if !global.quiet {
        print_outcome(&outcome);
    }
    Ok(0)
}

/// Prints where the elaborated design lives and whether it was reused.
pub fn print_outcome(outcome: &ElabOutcome) {
    let verb = if outcome.reused { "Reused" } else { "Elaborated" };
    eprintln!("{verb:>12} {}", outcome.dir.display());
}
