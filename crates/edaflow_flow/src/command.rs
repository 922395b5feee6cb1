//! Compiler command synthesis and batching.
//!
//! Each source file gets a deterministic command line built from the project
//! configuration, its target and its own settings. Consecutive files of a
//! library whose command text is byte-identical share one compiler
//! invocation. Files are never reordered, so a batch is always a contiguous
//! run of the catalog.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use edaflow_cache::{LibraryBuildState, LibraryPlan};
use edaflow_common::{merge_defines, merge_unique, SourceFile};
use edaflow_config::{FlowConfig, ResolvedTarget};

use crate::context::FlowContext;
use crate::error::FlowError;

/// A contiguous run of files sharing one compile command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileBatch {
    /// Library the files compile into.
    pub library: String,
    /// Command text shared by every file, without the file list.
    pub command: String,
    /// Files in catalog order.
    pub files: Vec<PathBuf>,
    /// Whether any file of the batch needs compiling.
    pub pending: bool,
}

impl CompileBatch {
    /// The full shell invocation: the command followed by every file.
    pub fn invocation(&self) -> String {
        let mut out = self.command.clone();
        for file in &self.files {
            out.push(' ');
            out.push_str(&shell_quote(&file.to_string_lossy()));
        }
        out
    }
}

/// Builds compile commands for the files of one target.
#[derive(Debug, Clone, Copy)]
pub struct CommandSynthesizer<'a> {
    config: &'a FlowConfig,
    target: &'a ResolvedTarget,
    build_dir: &'a Path,
    overrides: &'a [String],
}

impl<'a> CommandSynthesizer<'a> {
    /// Creates a synthesizer for `target` within `ctx`.
    pub fn new(ctx: &'a FlowContext, target: &'a ResolvedTarget) -> Self {
        Self {
            config: &ctx.config,
            target,
            build_dir: &ctx.build_dir,
            overrides: &ctx.compile_overrides,
        }
    }

    /// Returns the compile command for `file`, without the file itself.
    ///
    /// Arguments appear in a fixed order: front-end, work library, defines
    /// and include directories (verilog family only), language standard,
    /// extra options from the global, target and file layers, coverage and
    /// debug flags, then command-line overrides.
    pub fn file_command(&self, file: &SourceFile) -> Result<String, FlowError> {
        let compile = &self.config.compile;
        let front_end =
            self.config
                .tools
                .front_end(file.language)
                .ok_or_else(|| FlowError::MissingFrontEnd {
                    language: file.language,
                    file: file.path.clone(),
                })?;

        let mut args: Vec<String> = vec![front_end.to_string(), "-work".to_string()];
        let work = LibraryBuildState::library_dir(self.build_dir, &file.library);
        args.push(shell_quote(&work.to_string_lossy()).into_owned());

        if file.is_verilog_family() {
            let defines = merge_defines(&[
                &compile.defines[..],
                &self.target.defines[..],
                &file.defines[..],
            ]);
            args.extend(
                defines
                    .iter()
                    .map(|d| shell_quote(&format!("+define+{d}")).into_owned()),
            );
            let incdirs = merge_unique(&[
                &self.target.global_incdirs[..],
                &self.target.incdirs[..],
                &file.incdirs[..],
            ]);
            args.extend(
                incdirs
                    .iter()
                    .map(|d| shell_quote(&format!("+incdir+{}", d.display())).into_owned()),
            );
        }

        push_options(&mut args, compile.standard_flag(file.language));
        push_options(&mut args, &compile.options);
        push_options(&mut args, &self.target.compile_options);
        push_options(&mut args, &file.options);
        push_options(&mut args, compile.coverage.then_some(&compile.coverage_flag));
        push_options(&mut args, compile.debug.then_some(&compile.debug_flag));
        push_options(&mut args, self.overrides);

        Ok(args.join(" "))
    }

    /// Splits a library's files into batches of identical commands.
    ///
    /// A batch is pending when any of its files needs compiling; it then
    /// recompiles all of them.
    pub fn batches(&self, plan: &LibraryPlan<'_>) -> Result<Vec<CompileBatch>, FlowError> {
        let mut batches: Vec<CompileBatch> = Vec::new();
        for (file, &dirty) in plan.files.iter().zip(&plan.needs_compile) {
            let command = self.file_command(file)?;
            match batches.last_mut() {
                Some(batch) if batch.command == command => {
                    batch.files.push(file.path.clone());
                    batch.pending |= dirty;
                }
                _ => batches.push(CompileBatch {
                    library: plan.state.name.clone(),
                    command,
                    files: vec![file.path.clone()],
                    pending: dirty,
                }),
            }
        }
        Ok(batches)
    }
}

/// Appends non-blank option strings verbatim.
pub(crate) fn push_options<I, S>(args: &mut Vec<String>, options: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for option in options {
        let option = option.as_ref().trim();
        if !option.is_empty() {
            args.push(option.to_string());
        }
    }
}

/// Quotes `arg` for `sh` unless it consists only of characters the shell
/// passes through unchanged.
pub fn shell_quote(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=+:,@%".contains(c));
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}
