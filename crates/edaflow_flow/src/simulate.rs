//! Simulation of an elaborated test.
//!
//! A simulation that exits nonzero is a test result, not a flow error: the
//! exit code is recorded in the `SIM` trailer and the caller decides what it
//! means.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use edaflow_config::{ResolvedTarget, TestRunSpec};
use tracing::info;

use crate::command::push_options;
use crate::context::FlowContext;
use crate::elaborate::ElabOutcome;
use crate::error::FlowError;
use crate::trailer::{LogTrailer, Step};

/// Name of the simulation log inside a test's run directory.
pub const SIM_LOG: &str = "sim.log";

/// Environment variable holding the elaboration directory during simulation.
pub const ELAB_DIR_ENV: &str = "ELAB_DIR";

/// Result of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOutcome {
    /// The test that ran.
    pub test: String,
    /// The trailer written to the log.
    pub trailer: LogTrailer,
    /// The simulation log.
    pub log: PathBuf,
}

/// Builds the simulation command for `test`.
pub fn sim_command(
    ctx: &FlowContext,
    target: &ResolvedTarget,
    test: &TestRunSpec,
) -> Result<String, FlowError> {
    let sim = &ctx.config.simulate;
    let front_end = ctx
        .config
        .tools
        .simulate
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(FlowError::MissingTool { tool: "simulate" })?;

    let mut args = vec![front_end.to_string()];
    push_options(&mut args, &sim.options);
    push_options(&mut args, &target.sim_options);
    push_options(&mut args, &test.sim_options);
    push_options(&mut args, [&sim.seed_flag]);
    args.push(test.seed.to_string());
    Ok(args.join(" "))
}

/// Simulates `test` in its run directory with `ELAB_DIR` pointing at the
/// elaborated design.
pub fn simulate(
    ctx: &FlowContext,
    target: &ResolvedTarget,
    test: &TestRunSpec,
    elab: &ElabOutcome,
) -> Result<SimOutcome, FlowError> {
    let command = sim_command(ctx, target, test)?;
    let run_dir = ctx.run_dir(&target.name, &test.name);
    fs::create_dir_all(&run_dir).map_err(|e| FlowError::io(&run_dir, e))?;
    let log = run_dir.join(SIM_LOG);

    info!(test = %test.name, seed = test.seed, "simulating");
    let file = File::create(&log).map_err(|e| FlowError::io(&log, e))?;
    let mut out = BufWriter::new(file);
    let outcome = ctx.runner.run(
        &command,
        &run_dir,
        &[(ELAB_DIR_ENV, elab.dir.as_os_str())],
        &mut out,
    )?;
    out.flush().map_err(|e| FlowError::io(&log, e))?;
    drop(out);

    let trailer = LogTrailer::new(Step::Sim, outcome.exit_code, outcome.elapsed);
    trailer.append_to(&log)?;
    info!(test = %test.name, exit_code = outcome.exit_code, "simulation finished");
    Ok(SimOutcome {
        test: test.name.clone(),
        trailer,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CancelToken, ProcessRunner};
    use edaflow_config::{load_config_from_str, resolve_target, resolve_test};

    #[test]
    fn command_layers_options_and_seed() {
        let config = load_config_from_str(
            r#"
[project]
name = "soc"

[tools]
simulate = "vsim -c"

[simulate]
options = "-quiet"
seed_flag = "-sv_seed"

[targets.tb]
top = "top"
sim_options = ["-do run.do"]

[tests.smoke]
target = "tb"
seed = 42
sim_options = ["+UVM_TESTNAME=smoke"]
"#,
        )
        .unwrap();
        let ctx = FlowContext::new(config, "/proj", ProcessRunner::new(CancelToken::new()));
        let target = resolve_target(&ctx.config, &ctx.root, "tb").unwrap();
        let test = resolve_test(&ctx.config, "smoke").unwrap();
        assert_eq!(
            sim_command(&ctx, &target, &test).unwrap(),
            "vsim -c -quiet -do run.do +UVM_TESTNAME=smoke -sv_seed 42"
        );
    }
}
