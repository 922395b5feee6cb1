//! Parsing and validation of `edaflow.toml` project configuration files.
//!
//! This crate reads the project configuration file and produces a strongly-typed
//! [`FlowConfig`], flattens HDL file lists, and resolves targets and tests into
//! the source catalog and run specifications consumed by the compile engine.

#![warn(missing_docs)]

pub mod error;
pub mod filelist;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use filelist::{parse_filelist, FileList};
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_target, resolve_test, ResolvedTarget, TestRunSpec};
pub use types::*;
