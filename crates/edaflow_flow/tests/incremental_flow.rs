//! End-to-end tests of the compile, elaborate and simulate flow.
//!
//! The vendor tools are replaced by small shell scripts that append their
//! command line to `calls.log`, so each test can count exactly which
//! invocations a flow step issued.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use edaflow_config::{load_config_from_str, resolve_target, resolve_test, ResolvedTarget};
use edaflow_flow::{
    compile_target, elaborate, run_regression, run_test, simulate, CancelToken, FlowContext,
    FlowError, LogTrailer, ProcessRunner, Step, TestStatus, ELAB_LOG, SIM_LOG,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helper: a project with fake tools
// ---------------------------------------------------------------------------

const SOURCES: [&str; 6] = [
    "rtl/a.vhd",
    "rtl/b.vhd",
    "rtl/c.vhd",
    "rtl/d.vhd",
    "tb/tb_top.sv",
    "tb/helpers.sv",
];

struct Project {
    dir: TempDir,
    max_dirs: usize,
}

impl Project {
    fn new() -> Self {
        Self::with_max_dirs(1000)
    }

    fn with_max_dirs(max_dirs: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = Self { dir, max_dirs };
        project.write_tools();
        let extra = ["tb/tb_pkg.vhd", "tb/inc/defs.svh", "gate/dut_gate.vhd"];
        for rel in SOURCES.iter().chain(extra.iter()) {
            let path = project.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("// {rel}\n")).unwrap();
            set_mtime(&path, SystemTime::now() - Duration::from_secs(60));
        }
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    fn write_tools(&self) {
        let calls = self.path("calls.log");
        let calls = calls.display();
        let tools = [
            (
                "vcom",
                format!(
                    "echo \"vcom $*\" >> '{calls}'\n\
                     case \"$*\" in *+FAILCOMPILE*) echo '** Error: syntax error'; exit 1;; esac\n"
                ),
            ),
            ("vlog", format!("echo \"vlog $*\" >> '{calls}'\n")),
            (
                "vopt",
                format!(
                    "echo \"vopt $*\" >> '{calls}'\n\
                     case \"$*\" in *+BROKEN*) echo 'Error: elaboration failed'; exit 1;; esac\n\
                     case \"$*\" in *+SLOW*) sleep 30;; esac\n\
                     echo design > design.bin\n"
                ),
            ),
            (
                "vsim",
                format!(
                    "echo \"vsim $*\" >> '{calls}'\n\
                     test -f \"$ELAB_DIR/design.bin\" || {{ echo \"no design in $ELAB_DIR\"; exit 3; }}\n\
                     case \"$*\" in *+FAIL*) echo 'UVM_ERROR check failed'; exit 2;; esac\n\
                     case \"$*\" in *+SLOW*) sleep 30;; esac\n\
                     echo 'UVM_INFO test passed'\n"
                ),
            ),
        ];
        let bin = self.path("bin");
        fs::create_dir_all(&bin).unwrap();
        for (name, body) in tools {
            let script = bin.join(name);
            fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    fn config_text(&self) -> String {
        let bin = self.path("bin");
        let bin = bin.display();
        format!(
            r#"
[project]
name = "soc"

[tools]
vhdl = "{bin}/vcom"
systemverilog = "{bin}/vlog -sv"
elaborate = "{bin}/vopt"
simulate = "{bin}/vsim -c"
framework = "echo FRAMEWORK_BOOTSTRAP"

[elaborate]
max_dirs = {max_dirs}

[targets.tb]
top = "tb_lib.tb_top"

[[targets.tb.sources]]
library = "dut"
language = "vhdl"
files = ["rtl/a.vhd", "rtl/b.vhd", "rtl/c.vhd"]

[[targets.tb.sources]]
library = "dut"
language = "vhdl"
files = ["rtl/d.vhd"]
options = ["-explicit"]

[[targets.tb.sources]]
library = "tb_lib"
language = "systemverilog"
files = ["tb/tb_top.sv"]
incdirs = ["tb/inc"]

[[targets.tb.sources]]
library = "tb_lib"
language = "systemverilog"
files = ["tb/helpers.sv"]

[[targets.tb.sources]]
library = "tb_lib"
language = "vhdl"
files = ["tb/tb_pkg.vhd"]

[targets.gate]
top = "tb_lib.tb_top"

[[targets.gate.sources]]
library = "dut_gate"
language = "vhdl"
files = ["gate/dut_gate.vhd"]

[tests.smoke]
target = "tb"
seed = 7

[tests.t_gate]
target = "gate"

[tests.slow_elab]
target = "tb"
elab_options = ["+SLOW"]

[tests.slow_sim]
target = "tb"
sim_options = ["+SLOW"]

[tests.failing]
target = "tb"
sim_options = ["+FAIL"]

[tests.broken]
target = "tb"
elab_options = ["+BROKEN"]
"#,
            max_dirs = self.max_dirs
        )
    }

    fn context(&self) -> FlowContext {
        self.context_with(CancelToken::new())
    }

    fn context_with(&self, token: CancelToken) -> FlowContext {
        let config = load_config_from_str(&self.config_text()).unwrap();
        let runner = ProcessRunner::new(token).with_grace(Duration::from_millis(200));
        FlowContext::new(config, self.root(), runner)
    }

    fn target(&self, ctx: &FlowContext) -> ResolvedTarget {
        resolve_target(&ctx.config, &ctx.root, "tb").unwrap()
    }

    /// Tool invocations recorded since the last call, then clears the record.
    fn take_calls(&self) -> Vec<String> {
        let path = self.path("calls.log");
        let calls = fs::read_to_string(&path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect();
        let _ = fs::remove_file(&path);
        calls
    }

    /// Marks `rel` as edited after every earlier flow step.
    fn touch(&self, rel: &str) {
        // Filesystem timestamps are coarser than the system clock.
        thread::sleep(Duration::from_millis(50));
        set_mtime(&self.path(rel), SystemTime::now() - Duration::from_millis(20));
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn count(calls: &[String], tool: &str) -> usize {
    calls.iter().filter(|c| c.starts_with(tool)).count()
}

fn cancel_after(token: &CancelToken, delay: Duration) -> JoinHandle<()> {
    let token = token.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        token.cancel();
    })
}

// ===========================================================================
// Incremental compilation
// ===========================================================================

#[test]
fn first_compile_builds_every_batch() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);

    let report = compile_target(&ctx, &target).unwrap();
    assert_eq!(report.invocations(), 5);
    let calls = project.take_calls();
    assert_eq!(count(&calls, "vcom"), 3);
    assert_eq!(count(&calls, "vlog"), 2);
    assert!(ctx.build_dir.join("libs/dut/compiled_files.json").exists());
    assert!(ctx.build_dir.join("libs/tb_lib/compiled_files.json").exists());
}

#[test]
fn second_compile_issues_no_invocations() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);

    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    let report = compile_target(&ctx, &target).unwrap();
    assert_eq!(report.invocations(), 0);
    assert!(project.take_calls().is_empty());
}

#[test]
fn touching_one_file_recompiles_only_its_batch() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    project.touch("rtl/d.vhd");
    compile_target(&ctx, &target).unwrap();
    let calls = project.take_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("-explicit"));
    assert!(calls[0].ends_with("rtl/d.vhd"));

    assert!(project.take_calls().is_empty());
    compile_target(&ctx, &target).unwrap();
    assert!(project.take_calls().is_empty());
}

#[test]
fn editing_one_batch_member_recompiles_the_whole_batch() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    project.touch("rtl/b.vhd");
    compile_target(&ctx, &target).unwrap();
    let calls = project.take_calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    let a = call.find("rtl/a.vhd").unwrap();
    let b = call.find("rtl/b.vhd").unwrap();
    let c = call.find("rtl/c.vhd").unwrap();
    assert!(a < b && b < c);
}

#[test]
fn header_change_recompiles_files_declaring_the_directory() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    project.touch("tb/inc/defs.svh");
    compile_target(&ctx, &target).unwrap();
    let calls = project.take_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("vlog"));
    assert!(calls[0].contains("tb/tb_top.sv"));
    assert!(!calls[0].contains("helpers.sv"));
}

#[test]
fn failed_compile_leaves_library_state_untouched() {
    let project = Project::new();
    let ctx = project
        .context()
        .with_compile_overrides(vec!["+FAILCOMPILE".to_string()]);
    let target = project.target(&ctx);

    let err = compile_target(&ctx, &target).unwrap_err();
    assert!(matches!(err, FlowError::CompileFailed { ref library, code: 1, .. } if library == "dut"));
    assert!(!ctx.build_dir.join("libs/dut/compiled_files.json").exists());
    let log = fs::read_to_string(ctx.compile_log()).unwrap();
    assert!(log.contains("** Error: syntax error"));
    assert_eq!(project.take_calls().len(), 1);

    let ctx = project.context();
    let report = compile_target(&ctx, &target).unwrap();
    assert_eq!(report.invocations(), 5);
}

#[test]
fn interrupted_compile_spawns_nothing_and_records_nothing() {
    let project = Project::new();
    let token = CancelToken::new();
    token.cancel();
    let ctx = project.context_with(token);
    let target = project.target(&ctx);

    let err = compile_target(&ctx, &target).unwrap_err();
    assert!(matches!(err, FlowError::Interrupted { .. }));
    assert!(project.take_calls().is_empty());
    assert!(!ctx.build_dir.join("libs/dut/compiled_files.json").exists());
}

#[test]
fn framework_bootstraps_once_across_targets() {
    let project = Project::new();
    let ctx = project.context();
    let rtl = project.target(&ctx);
    let gate = resolve_target(&ctx.config, &ctx.root, "gate").unwrap();

    assert!(compile_target(&ctx, &rtl).unwrap().framework_ran);
    let report = compile_target(&ctx, &gate).unwrap();
    assert_eq!(report.invocations(), 1);
    assert!(!report.framework_ran);

    let log = fs::read_to_string(ctx.compile_log()).unwrap();
    assert_eq!(log.lines().filter(|l| *l == "FRAMEWORK_BOOTSTRAP").count(), 1);
}

// ===========================================================================
// Elaboration reuse
// ===========================================================================

#[test]
fn identical_elaboration_runs_once() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    let smoke = resolve_test(&ctx.config, "smoke").unwrap();
    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    let first = elaborate(&ctx, &target, &smoke).unwrap();
    assert!(!first.reused);
    assert_eq!(first.dir, ctx.build_dir.join("elab/elab_tb_smoke_000"));
    assert_eq!(
        fs::read_to_string(first.dir.join("elab.cmd")).unwrap(),
        first.command
    );

    let second = elaborate(&ctx, &target, &smoke).unwrap();
    assert!(second.reused);
    assert_eq!(second.dir, first.dir);
    assert_eq!(count(&project.take_calls(), "vopt"), 1);

    let trailer = LogTrailer::read(&second.log, Step::Elab).unwrap();
    assert_eq!(trailer.exit_code, 0);
    assert_eq!(trailer.run_time, 0.0);
    assert_eq!(
        second.log,
        ctx.build_dir.join("runs/tb/smoke").join(ELAB_LOG)
    );
}

#[test]
fn recompiled_library_forces_rebuild_in_place() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    let smoke = resolve_test(&ctx.config, "smoke").unwrap();
    compile_target(&ctx, &target).unwrap();
    let first = elaborate(&ctx, &target, &smoke).unwrap();
    project.take_calls();

    project.touch("rtl/a.vhd");
    compile_target(&ctx, &target).unwrap();
    let second = elaborate(&ctx, &target, &smoke).unwrap();
    assert!(!second.reused);
    assert_eq!(second.dir, first.dir);
    let calls = project.take_calls();
    assert_eq!(count(&calls, "vcom"), 1);
    assert_eq!(count(&calls, "vopt"), 1);

    let third = elaborate(&ctx, &target, &smoke).unwrap();
    assert!(third.reused);
}

#[test]
fn changed_command_allocates_next_directory() {
    let project = Project::new();
    let base = project.context();
    let target = project.target(&base);
    let smoke = resolve_test(&base.config, "smoke").unwrap();
    compile_target(&base, &target).unwrap();

    let first = elaborate(&base, &target, &smoke).unwrap();
    let ctx = project.context().with_elab_overrides(vec!["-O0".to_string()]);
    let second = elaborate(&ctx, &target, &smoke).unwrap();
    assert_ne!(first.dir, second.dir);
    assert_eq!(second.dir, ctx.build_dir.join("elab/elab_tb_smoke_001"));

    // Both remain reusable.
    assert!(elaborate(&base, &target, &smoke).unwrap().reused);
    assert!(elaborate(&ctx, &target, &smoke).unwrap().reused);
}

#[test]
fn targets_never_share_elaborations() {
    let project = Project::new();
    let ctx = project.context();
    let rtl = project.target(&ctx);
    let gate = resolve_target(&ctx.config, &ctx.root, "gate").unwrap();
    compile_target(&ctx, &rtl).unwrap();
    compile_target(&ctx, &gate).unwrap();
    project.take_calls();

    let smoke = resolve_test(&ctx.config, "smoke").unwrap();
    let t_gate = resolve_test(&ctx.config, "t_gate").unwrap();
    let first = elaborate(&ctx, &rtl, &smoke).unwrap();
    let second = elaborate(&ctx, &gate, &t_gate).unwrap();

    // Same command text, different libraries.
    assert_eq!(first.command, second.command);
    assert!(!second.reused);
    assert_eq!(second.dir, ctx.build_dir.join("elab/elab_gate_t_gate_000"));
    assert_eq!(count(&project.take_calls(), "vopt"), 2);

    assert!(elaborate(&ctx, &gate, &t_gate).unwrap().reused);
    assert_eq!(elaborate(&ctx, &rtl, &smoke).unwrap().dir, first.dir);
}

#[test]
fn full_directory_set_is_a_fatal_error() {
    let project = Project::with_max_dirs(2);
    let base = project.context();
    let target = project.target(&base);
    let smoke = resolve_test(&base.config, "smoke").unwrap();
    compile_target(&base, &target).unwrap();

    let mut markers = Vec::new();
    for opt in ["-O1", "-O2"] {
        let ctx = project.context().with_elab_overrides(vec![opt.to_string()]);
        let outcome = elaborate(&ctx, &target, &smoke).unwrap();
        markers.push((outcome.dir.join("elab.cmd"), outcome.command));
    }
    project.take_calls();

    let ctx = project.context().with_elab_overrides(vec!["-O3".to_string()]);
    let err = elaborate(&ctx, &target, &smoke).unwrap_err();
    assert!(err.to_string().contains("directory limit exceeded"));
    assert!(project.take_calls().is_empty());
    for (marker, command) in markers {
        assert_eq!(fs::read_to_string(marker).unwrap(), command);
    }
}

#[test]
fn failed_elaboration_writes_no_marker() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    let broken = resolve_test(&ctx.config, "broken").unwrap();
    compile_target(&ctx, &target).unwrap();

    let (code, log) = match elaborate(&ctx, &target, &broken).unwrap_err() {
        FlowError::ElaborationFailed { code, log, .. } => (code, log),
        other => panic!("unexpected error: {other}"),
    };
    assert_eq!(code, 1);
    assert!(!ctx
        .build_dir
        .join("elab/elab_tb_broken_000/elab.cmd")
        .exists());
    let trailer = LogTrailer::read(&log, Step::Elab).unwrap();
    assert_eq!(trailer.exit_code, 1);

    // The unmarked directory is taken again by the next attempt.
    assert!(elaborate(&ctx, &target, &broken).is_err());
    assert!(!ctx.build_dir.join("elab/elab_tb_broken_001").exists());
}

#[test]
fn interrupted_elaboration_leaves_no_trailer_and_no_marker() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    compile_target(&ctx, &target).unwrap();
    project.take_calls();

    let token = CancelToken::new();
    let ctx = project.context_with(token.clone());
    let slow = resolve_test(&ctx.config, "slow_elab").unwrap();
    let canceller = cancel_after(&token, Duration::from_millis(300));
    let started = Instant::now();
    let err = elaborate(&ctx, &target, &slow).unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, FlowError::Interrupted { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(count(&project.take_calls(), "vopt"), 1);
    let log = ctx.build_dir.join("runs/tb/slow_elab").join(ELAB_LOG);
    assert!(LogTrailer::read(&log, Step::Elab).is_none());
    let slot = ctx.build_dir.join("elab/elab_tb_slow_elab_000");
    assert!(!slot.join("elab.cmd").exists());
    assert!(!slot.join("design.bin").exists());
}

// ===========================================================================
// Simulation and regression
// ===========================================================================

#[test]
fn interrupted_simulation_leaves_no_trailer() {
    let project = Project::new();
    let ctx = project.context();
    let target = project.target(&ctx);
    let slow = resolve_test(&ctx.config, "slow_sim").unwrap();
    compile_target(&ctx, &target).unwrap();
    let elab = elaborate(&ctx, &target, &slow).unwrap();
    project.take_calls();

    let token = CancelToken::new();
    let ctx = project.context_with(token.clone());
    let canceller = cancel_after(&token, Duration::from_millis(300));
    let started = Instant::now();
    let err = simulate(&ctx, &target, &slow, &elab).unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, FlowError::Interrupted { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(count(&project.take_calls(), "vsim"), 1);
    let log = ctx.build_dir.join("runs/tb/slow_sim").join(SIM_LOG);
    assert!(LogTrailer::read(&log, Step::Sim).is_none());
}

#[test]
fn run_test_simulates_against_the_elaborated_design() {
    let project = Project::new();
    let ctx = project.context();

    let (elab, sim) = run_test(&ctx, "smoke").unwrap();
    assert!(!elab.reused);
    assert_eq!(sim.trailer.exit_code, 0);
    let log = fs::read_to_string(&sim.log).unwrap();
    assert!(log.contains("UVM_INFO test passed"));
    assert!(log.trim_end().ends_with(&format!(
        "TS_SIM_RUN_TIME: {:.3}",
        sim.trailer.run_time
    )));

    let calls = project.take_calls();
    let vsim = calls.iter().find(|c| c.starts_with("vsim")).unwrap();
    assert!(vsim.ends_with("-sv_seed 7"));
}

#[test]
fn regression_records_failures_without_stopping() {
    let project = Project::new();
    let ctx = project.context();
    let tests = vec!["smoke".to_string(), "failing".to_string()];

    let summary = run_regression(&ctx, &tests, 2).unwrap();
    assert_eq!(summary.results.len(), 2);
    assert_eq!(summary.results[0].test, "smoke");
    assert_eq!(summary.results[0].status, TestStatus::Passed);
    assert_eq!(summary.results[1].status, TestStatus::Failed(2));
    // Both tests elaborate to the same command.
    assert!(summary.results[1].elab_reused);
    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failed(), 1);

    let calls = project.take_calls();
    assert_eq!(count(&calls, "vcom"), 3);
    assert_eq!(count(&calls, "vopt"), 1);
    assert_eq!(count(&calls, "vsim"), 2);
}

#[test]
fn regression_stops_on_elaboration_failure() {
    let project = Project::new();
    let ctx = project.context();
    let tests = vec!["broken".to_string(), "smoke".to_string()];

    let err = run_regression(&ctx, &tests, 1).unwrap_err();
    assert!(matches!(err, FlowError::ElaborationFailed { .. }));
    assert_eq!(count(&project.take_calls(), "vsim"), 0);
}

#[test]
fn regression_over_two_targets_bootstraps_once() {
    let project = Project::new();
    let ctx = project.context();
    let tests = vec!["smoke".to_string(), "t_gate".to_string()];

    let summary = run_regression(&ctx, &tests, 2).unwrap();
    assert!(summary.all_passed());
    assert!(!summary.results[1].elab_reused);

    let calls = project.take_calls();
    assert_eq!(count(&calls, "vcom"), 4);
    assert_eq!(count(&calls, "vopt"), 2);
    let log = fs::read_to_string(ctx.compile_log()).unwrap();
    assert_eq!(log.lines().filter(|l| *l == "FRAMEWORK_BOOTSTRAP").count(), 1);
}
