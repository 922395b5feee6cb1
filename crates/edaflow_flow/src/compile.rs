//! The compilation executor.
//!
//! Runs the pending batches of a target library by library. Every batch's
//! merged output is captured in the library's scratch log and then appended
//! to the cumulative compile log. A library's persisted state is written
//! only after all of its pending batches succeed; the first failing batch
//! stops the whole step.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use edaflow_cache::detect_changes;
use edaflow_common::merge_unique;
use edaflow_config::ResolvedTarget;
use tracing::info;

use crate::command::{CommandSynthesizer, CompileBatch};
use crate::context::FlowContext;
use crate::error::FlowError;

/// Scratch log name inside each library build directory.
const SCRATCH_LOG: &str = "compile.scratch.log";

/// Scratch log name for the framework bootstrap, under the build directory.
const FRAMEWORK_SCRATCH_LOG: &str = "framework.scratch.log";

/// Summary of one library after a compile step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryReport {
    /// Library name.
    pub library: String,
    /// Files compiled by this step.
    pub files_compiled: usize,
    /// Compiler invocations issued.
    pub invocations: usize,
}

impl LibraryReport {
    /// Returns `true` if nothing was compiled.
    pub fn is_up_to_date(&self) -> bool {
        self.invocations == 0
    }
}

/// Summary of a compile step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    /// One entry per library, in catalog order.
    pub libraries: Vec<LibraryReport>,
    /// Whether the framework bootstrap ran during this step.
    pub framework_ran: bool,
}

impl CompileReport {
    /// Total compiler invocations, excluding the framework bootstrap.
    pub fn invocations(&self) -> usize {
        self.libraries.iter().map(|l| l.invocations).sum()
    }
}

/// Incrementally compiles every library of `target`.
///
/// All commands are synthesized before anything runs, so a missing
/// front-end fails before the first process starts. The framework bootstrap
/// runs at most once per [`FlowContext`], before the first pending batch.
pub fn compile_target(ctx: &FlowContext, target: &ResolvedTarget) -> Result<CompileReport, FlowError> {
    let shared_incdirs = merge_unique(&[&target.global_incdirs[..], &target.incdirs[..]]);
    let plans = detect_changes(&target.catalog, &ctx.build_dir, &shared_incdirs);
    let synth = CommandSynthesizer::new(ctx, target);

    let mut work = Vec::with_capacity(plans.len());
    for plan in plans {
        let batches = synth.batches(&plan)?;
        work.push((plan, batches));
    }

    let mut report = CompileReport::default();
    let any_pending = work.iter().any(|(_, batches)| batches.iter().any(|b| b.pending));
    if !any_pending {
        info!(target = %target.name, "all libraries up to date");
        report.libraries = work
            .iter()
            .map(|(plan, _)| LibraryReport {
                library: plan.state.name.clone(),
                files_compiled: 0,
                invocations: 0,
            })
            .collect();
        return Ok(report);
    }

    fs::create_dir_all(&ctx.build_dir).map_err(|e| FlowError::io(&ctx.build_dir, e))?;
    let compile_log = ctx.compile_log();

    let framework = ctx
        .config
        .tools
        .framework
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(framework) = framework.filter(|_| !ctx.framework_done()) {
        info!(command = framework, "running framework bootstrap");
        let scratch = ctx.build_dir.join(FRAMEWORK_SCRATCH_LOG);
        let code = run_logged(ctx, framework, &scratch, &compile_log)?;
        if code != 0 {
            return Err(FlowError::FrameworkFailed {
                command: framework.to_string(),
                code,
                log: compile_log,
            });
        }
        ctx.mark_framework_done();
        report.framework_ran = true;
    }

    for (mut plan, batches) in work {
        let library = plan.state.name.clone();
        let pending: Vec<&CompileBatch> = batches.iter().filter(|b| b.pending).collect();
        if pending.is_empty() {
            info!(library = %library, "up to date");
            report.libraries.push(LibraryReport {
                library,
                files_compiled: 0,
                invocations: 0,
            });
            continue;
        }

        fs::create_dir_all(&plan.state.dir).map_err(|e| FlowError::io(&plan.state.dir, e))?;
        let scratch = plan.state.dir.join(SCRATCH_LOG);
        for batch in &pending {
            let invocation = batch.invocation();
            info!(library = %library, files = batch.files.len(), "compiling");
            let code = run_logged(ctx, &invocation, &scratch, &compile_log)?;
            if code != 0 {
                return Err(FlowError::CompileFailed {
                    library,
                    command: invocation,
                    code,
                    log: compile_log,
                });
            }
        }

        let files_compiled = pending.iter().map(|b| b.files.len()).sum();
        plan.state
            .merge_and_save(pending.iter().flat_map(|b| b.files.iter().cloned()))?;
        report.libraries.push(LibraryReport {
            library,
            files_compiled,
            invocations: pending.len(),
        });
    }

    Ok(report)
}

/// Runs `command` in the build directory with output captured in `scratch`,
/// then appends the scratch log to `compile_log`. Returns the exit code.
fn run_logged(
    ctx: &FlowContext,
    command: &str,
    scratch: &Path,
    compile_log: &Path,
) -> Result<i32, FlowError> {
    let file = File::create(scratch).map_err(|e| FlowError::io(scratch, e))?;
    let mut out = BufWriter::new(file);
    let outcome = ctx.runner.run(command, &ctx.build_dir, &[], &mut out)?;
    out.flush().map_err(|e| FlowError::io(scratch, e))?;
    drop(out);
    append_file(scratch, compile_log, command).map_err(|e| FlowError::io(compile_log, e))?;
    Ok(outcome.exit_code)
}

fn append_file(from: &Path, to: &Path, command: &str) -> io::Result<()> {
    let mut dest = OpenOptions::new().create(true).append(true).open(to)?;
    writeln!(dest, "# {command}")?;
    let mut src = File::open(from)?;
    io::copy(&mut src, &mut dest)?;
    Ok(())
}
