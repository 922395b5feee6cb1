//! Shared helpers for CLI commands.
//!
//! Locates the project, loads its configuration and builds the
//! [`FlowContext`] every command runs with.

use std::path::{Path, PathBuf};

use edaflow_config::{load_config, load_config_from_str, FlowConfig, CONFIG_FILE};
use edaflow_flow::{CancelToken, FlowContext, ProcessRunner};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `edaflow.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Loads the project configuration selected by the global arguments.
///
/// `--config` may name a configuration file, whose directory becomes the
/// project root, or a project directory. Without it the nearest
/// `edaflow.toml` above the current directory is used.
pub fn load_project(global: &GlobalArgs) -> Result<(PathBuf, FlowConfig), Box<dyn std::error::Error>> {
    match global.config.as_deref().map(PathBuf::from) {
        Some(path) if path.is_file() => {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let text = std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Ok((absolute(root)?, load_config_from_str(&text)?))
        }
        Some(dir) => {
            let config = load_config(&dir)?;
            Ok((absolute(dir)?, config))
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?)?;
            let config = load_config(&root)?;
            Ok((root, config))
        }
    }
}

/// Builds the flow context for the selected project.
pub fn flow_context(
    global: &GlobalArgs,
    cancel: &CancelToken,
) -> Result<FlowContext, Box<dyn std::error::Error>> {
    let (root, config) = load_project(global)?;
    Ok(FlowContext::new(
        config,
        root,
        ProcessRunner::new(cancel.clone()),
    ))
}

/// Picks the target to compile: the named one, or the only one configured.
pub fn pick_target(config: &FlowConfig, name: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(name) = name {
        return Ok(name.to_string());
    }
    let mut names = config.targets.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => Err("no targets defined in the configuration".into()),
        (Some(_), Some(_)) => {
            let all: Vec<&str> = config.targets.keys().map(String::as_str).collect();
            Err(format!(
                "several targets defined, select one with --target: {}",
                all.join(", ")
            )
            .into())
        }
    }
}

fn absolute(path: PathBuf) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
