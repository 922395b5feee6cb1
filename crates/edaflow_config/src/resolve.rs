//! Target and test resolution: flattening sources into a catalog and merging
//! test overrides onto their target.

use crate::error::ConfigError;
use crate::filelist::parse_filelist;
use crate::types::{FlowConfig, GenericValue};
use edaflow_common::{HdlLanguage, SourceFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A target with every path made absolute and its source groups flattened
/// into an ordered catalog.
///
/// Option layers are kept separate; merging them is the job of the command
/// builders, which apply the global < target < file (or test) precedence.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// The target name.
    pub name: String,
    /// Top-level design unit.
    pub top: String,
    /// Ordered source catalog.
    pub catalog: Vec<SourceFile>,
    /// Global include directories (from `[compile]`), absolute.
    pub global_incdirs: Vec<PathBuf>,
    /// Target-level include directories, absolute.
    pub incdirs: Vec<PathBuf>,
    /// Target-level macro defines.
    pub defines: Vec<String>,
    /// Target-level compile options.
    pub compile_options: Vec<String>,
    /// Target-level elaboration options.
    pub elab_options: Vec<String>,
    /// Target-level simulation options.
    pub sim_options: Vec<String>,
    /// Target-level generic overrides.
    pub generics: BTreeMap<String, GenericValue>,
}

impl ResolvedTarget {
    /// Library names in order of first appearance in the catalog.
    pub fn libraries(&self) -> Vec<&str> {
        let mut libs: Vec<&str> = Vec::new();
        for file in &self.catalog {
            if !libs.contains(&file.library.as_str()) {
                libs.push(&file.library);
            }
        }
        libs
    }
}

/// One test run: a test bound to its target with its own overrides.
#[derive(Debug, Clone)]
pub struct TestRunSpec {
    /// The test name.
    pub name: String,
    /// Name of the target the test runs on.
    pub target: String,
    /// Random seed.
    pub seed: u64,
    /// Resolved top-level design unit (test override or target top).
    pub top: String,
    /// Test-level elaboration options.
    pub elab_options: Vec<String>,
    /// Test-level simulation options.
    pub sim_options: Vec<String>,
    /// Test-level generic overrides.
    pub generics: BTreeMap<String, GenericValue>,
    /// Verbosity level, if any.
    pub verbosity: Option<String>,
}

/// Resolves a named target into its absolute-path source catalog.
///
/// Source groups are flattened in declaration order; within a group, `files`
/// come first, followed by the contents of `filelist`. Include directories
/// and defines found in a file list apply to that group's files.
pub fn resolve_target(
    config: &FlowConfig,
    project_dir: &Path,
    target_name: &str,
) -> Result<ResolvedTarget, ConfigError> {
    let target = config
        .targets
        .get(target_name)
        .ok_or_else(|| ConfigError::UnknownTarget(target_name.to_string()))?;

    let mut catalog = Vec::new();
    for group in &target.sources {
        let language: HdlLanguage = group
            .language
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("target '{target_name}': {e}")))?;

        let mut paths: Vec<PathBuf> = group.files.iter().map(|f| project_dir.join(f)).collect();
        let mut incdirs = absolute_all(project_dir, &group.incdirs);
        let mut defines = group.defines.clone();
        if let Some(list) = &group.filelist {
            let fl = parse_filelist(&project_dir.join(list))?;
            paths.extend(fl.files);
            incdirs.extend(fl.incdirs);
            defines.extend(fl.defines);
        }

        for path in paths {
            let mut file = SourceFile::new(path, group.library.clone(), language);
            file.options = group.options.clone();
            file.incdirs = incdirs.clone();
            file.defines = defines.clone();
            catalog.push(file);
        }
    }

    Ok(ResolvedTarget {
        name: target_name.to_string(),
        top: target.top.clone(),
        catalog,
        global_incdirs: absolute_all(project_dir, &config.compile.incdirs),
        incdirs: absolute_all(project_dir, &target.incdirs),
        defines: target.defines.clone(),
        compile_options: target.compile_options.clone(),
        elab_options: target.elab_options.clone(),
        sim_options: target.sim_options.clone(),
        generics: target.generics.clone(),
    })
}

/// Resolves a named test, inheriting the top-level unit from its target when
/// the test does not override it.
pub fn resolve_test(config: &FlowConfig, test_name: &str) -> Result<TestRunSpec, ConfigError> {
    let test = config
        .tests
        .get(test_name)
        .ok_or_else(|| ConfigError::UnknownTest(test_name.to_string()))?;
    let target = config
        .targets
        .get(&test.target)
        .ok_or_else(|| ConfigError::UnknownTarget(test.target.clone()))?;

    Ok(TestRunSpec {
        name: test_name.to_string(),
        target: test.target.clone(),
        seed: test.seed,
        top: test.top.clone().unwrap_or_else(|| target.top.clone()),
        elab_options: test.elab_options.clone(),
        sim_options: test.sim_options.clone(),
        generics: test.generics.clone(),
        verbosity: test.verbosity.clone(),
    })
}

fn absolute_all(root: &Path, dirs: &[String]) -> Vec<PathBuf> {
    dirs.iter().map(|d| root.join(d)).collect()
}
