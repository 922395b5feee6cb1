//! edaflow CLI: the command-line driver for incremental HDL tool flows.
//!
//! Provides `edaflow compile` for incremental library compilation,
//! `edaflow elab` for cached elaboration, `edaflow run` for a single
//! simulation and `edaflow regress` for a regression with concurrent
//! simulations.

#![warn(missing_docs)]

mod compile;
mod elab;
mod pipeline;
mod regress;
mod run;

use std::process;

use clap::{Parser, Subcommand};
use edaflow_flow::{CancelToken, FlowError};

/// Exit code used when the run was interrupted by a signal.
const EXIT_INTERRUPTED: i32 = 130;

/// edaflow: incremental compile, elaborate and simulate for HDL projects.
#[derive(Parser, Debug)]
#[command(name = "edaflow", version, about = "Incremental HDL tool flow driver")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to an `edaflow.toml` file or the project directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Incrementally compile a target's libraries.
    Compile(CompileArgs),
    /// Compile and elaborate one test, reusing an earlier elaboration when possible.
    Elab(ElabArgs),
    /// Compile, elaborate and simulate one test.
    Run(RunArgs),
    /// Run many tests, simulating them concurrently.
    Regress(RegressArgs),
}

/// Arguments for the `edaflow compile` subcommand.
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Target name to select from `edaflow.toml`.
    #[arg(short, long)]
    pub target: Option<String>,

    /// Extra option appended to every compile command (repeatable).
    #[arg(long, allow_hyphen_values = true)]
    pub opt: Vec<String>,
}

/// Arguments for the `edaflow elab` subcommand.
#[derive(Parser, Debug)]
pub struct ElabArgs {
    /// Test name from `edaflow.toml`.
    pub test: String,

    /// Extra option added to the elaboration command (repeatable).
    #[arg(long, allow_hyphen_values = true)]
    pub opt: Vec<String>,
}

/// Arguments for the `edaflow run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test name from `edaflow.toml`.
    pub test: String,
}

/// Arguments for the `edaflow regress` subcommand.
#[derive(Parser, Debug)]
pub struct RegressArgs {
    /// Substring filter for test names.
    #[arg(long)]
    pub filter: Option<String>,

    /// Number of concurrent simulations (0 = one per CPU).
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    let result = match cli.command {
        Command::Compile(ref args) => compile::run(args, &global, &cancel),
        Command::Elab(ref args) => elab::run(args, &global, &cancel),
        Command::Run(ref args) => run::run(args, &global, &cancel),
        Command::Regress(ref args) => regress::run(args, &global, &cancel),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            let interrupted = matches!(
                e.downcast_ref::<FlowError>(),
                Some(FlowError::Interrupted { .. })
            );
            process::exit(if interrupted { EXIT_INTERRUPTED } else { 1 });
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `--verbose` selects debug output
/// and `--quiet` only errors.
fn init_tracing(global: &GlobalArgs) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

/// Routes SIGINT and SIGTERM into `cancel`.
fn install_interrupt_handler(cancel: &CancelToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }
}
