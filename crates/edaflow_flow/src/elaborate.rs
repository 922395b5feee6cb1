//! Elaboration with command-text reuse.
//!
//! The elaboration command for a test is built deterministically from the
//! configuration. Its exact text is the cache key: an elaboration directory
//! of the same target whose marker holds the same text is reused, unless one
//! of the target's libraries was compiled after the marker was written.
//! Otherwise the elaborator runs in a cleared directory and the marker is
//! written only when it succeeds.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use edaflow_cache::{ElabStore, LibraryBuildState};
use edaflow_common::merge_unique;
use edaflow_config::{GenericValue, ResolvedTarget, TestRunSpec};
use tracing::info;

use crate::command::push_options;
use crate::context::FlowContext;
use crate::error::FlowError;
use crate::trailer::{LogTrailer, Step};

/// Name of the elaboration log inside a test's run directory.
pub const ELAB_LOG: &str = "elab.log";

/// Result of an elaboration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElabOutcome {
    /// Directory holding the elaborated design.
    pub dir: PathBuf,
    /// The elaboration command text.
    pub command: String,
    /// Whether an earlier elaboration was reused without running the tool.
    pub reused: bool,
    /// The test's elaboration log.
    pub log: PathBuf,
}

/// Builds the elaboration command for `test` on `target`.
///
/// Options are layered global, target, test, then the test's verbosity and
/// command-line overrides. Generics are merged by name with the same
/// precedence and emitted in name order. The top-level unit comes last.
pub fn elab_command(
    ctx: &FlowContext,
    target: &ResolvedTarget,
    test: &TestRunSpec,
) -> Result<String, FlowError> {
    let elab = &ctx.config.elaborate;
    let front_end = ctx
        .config
        .tools
        .elaborate
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(FlowError::MissingTool { tool: "elaborate" })?;

    let mut args = vec![front_end.to_string()];
    let options = merge_unique(&[
        &elab.options[..],
        &target.elab_options[..],
        &test.elab_options[..],
    ]);
    push_options(&mut args, &options);
    if let Some(level) = test.verbosity.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        args.push(format!("{}{level}", elab.verbosity_flag));
    }

    let mut generics: BTreeMap<&str, &GenericValue> = BTreeMap::new();
    for layer in [&elab.generics, &target.generics, &test.generics] {
        generics.extend(layer.iter().map(|(name, value)| (name.as_str(), value)));
    }
    for (name, value) in generics {
        args.push(format!(
            "{}{name}={}",
            elab.generic_flag,
            quote_generic(value.as_str())
        ));
    }

    push_options(&mut args, &ctx.elab_overrides);
    args.push(test.top.clone());
    Ok(args.join(" "))
}

/// Formats a generic value for the elaboration command line.
///
/// Numbers, sized literals and booleans stay bare. Time literals and values
/// already in single quotes are wrapped in double quotes. Values already in
/// double quotes are kept. Anything else is single-quoted.
pub fn quote_generic(value: &str) -> String {
    let value = value.trim();
    if is_number(value) || is_sized_literal(value) || is_bool(value) {
        return value.to_string();
    }
    if is_time_literal(value) {
        return format!("\"{value}\"");
    }
    if let Some(inner) = strip_quotes(value, '\'') {
        return format!("\"{inner}\"");
    }
    if strip_quotes(value, '"').is_some() {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_number(value: &str) -> bool {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    !digits.is_empty()
        && digits.starts_with(|c: char| c.is_ascii_digit())
        && value.parse::<f64>().is_ok()
}

/// Verilog-style sized or based literals such as `8'hFF` or `'b1010`.
fn is_sized_literal(value: &str) -> bool {
    let Some((size, rest)) = value.split_once('\'') else {
        return false;
    };
    if !size.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let rest = rest.strip_prefix(['s', 'S']).unwrap_or(rest);
    let mut chars = rest.chars();
    matches!(chars.next(), Some('b' | 'B' | 'o' | 'O' | 'd' | 'D' | 'h' | 'H'))
        && {
            let digits = chars.as_str();
            !digits.is_empty()
                && digits
                    .chars()
                    .all(|c| c.is_ascii_hexdigit() || matches!(c, '_' | 'x' | 'X' | 'z' | 'Z' | '?'))
        }
}

fn is_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

fn is_time_literal(value: &str) -> bool {
    const UNITS: [&str; 9] = ["fs", "ps", "ns", "us", "ms", "sec", "s", "min", "hr"];
    let split = value
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number = number.trim_end();
    !unit.is_empty()
        && UNITS.iter().any(|u| unit.eq_ignore_ascii_case(u))
        && is_number(number)
}

fn strip_quotes(value: &str, quote: char) -> Option<&str> {
    value
        .strip_prefix(quote)
        .and_then(|v| v.strip_suffix(quote))
}

/// Elaborates `test`, reusing an earlier elaboration when possible.
///
/// The test's elaboration log is rewritten on every call and always ends
/// with an `ELAB` trailer, unless the run is interrupted.
pub fn elaborate(
    ctx: &FlowContext,
    target: &ResolvedTarget,
    test: &TestRunSpec,
) -> Result<ElabOutcome, FlowError> {
    let command = elab_command(ctx, target, test)?;
    let run_dir = ctx.run_dir(&target.name, &test.name);
    fs::create_dir_all(&run_dir).map_err(|e| FlowError::io(&run_dir, e))?;
    let log = run_dir.join(ELAB_LOG);

    let store = ElabStore::new(&ctx.build_dir, ctx.config.elaborate.max_dirs);
    let libraries: Vec<(&str, _)> = target
        .libraries()
        .into_iter()
        .map(|lib| (lib, LibraryBuildState::last_compiled(&ctx.build_dir, lib)))
        .collect();

    let tests: Vec<&str> = ctx
        .config
        .tests
        .iter()
        .filter(|(_, t)| t.target == target.name)
        .map(|(name, _)| name.as_str())
        .collect();
    let slot = match store.find(&target.name, &tests, &command) {
        Some(record) => match record.stale_library(&libraries) {
            None => {
                info!(test = %test.name, dir = %record.dir.display(), "reusing elaboration");
                let note = format!(
                    "edaflow: reusing elaboration in {} (command unchanged, libraries up to date)\n",
                    record.dir.display()
                );
                fs::write(&log, note).map_err(|e| FlowError::io(&log, e))?;
                LogTrailer::new(Step::Elab, 0, Duration::ZERO).append_to(&log)?;
                return Ok(ElabOutcome {
                    dir: record.dir,
                    command,
                    reused: true,
                    log,
                });
            }
            Some(library) => {
                info!(
                    test = %test.name,
                    library,
                    dir = %record.dir.display(),
                    "library changed since elaboration, rebuilding"
                );
                record.dir
            }
        },
        None => store.allocate(&target.name, &test.name)?,
    };

    ElabStore::prepare(&slot)?;
    info!(test = %test.name, dir = %slot.display(), "elaborating");
    let file = File::create(&log).map_err(|e| FlowError::io(&log, e))?;
    let mut out = BufWriter::new(file);
    let outcome = ctx.runner.run(&command, &slot, &[], &mut out)?;
    out.flush().map_err(|e| FlowError::io(&log, e))?;
    drop(out);
    LogTrailer::new(Step::Elab, outcome.exit_code, outcome.elapsed).append_to(&log)?;

    if !outcome.success() {
        return Err(FlowError::ElaborationFailed {
            test: test.name.clone(),
            command,
            code: outcome.exit_code,
            log,
        });
    }
    ElabStore::write_marker(&slot, &command)?;
    Ok(ElabOutcome {
        dir: slot,
        command,
        reused: false,
        log,
    })
}
