//! Configuration types deserialized from `edaflow.toml`.

use edaflow_common::HdlLanguage;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// The top-level project configuration parsed from `edaflow.toml`.
///
/// Passed by reference to every engine component; nothing in the engine reads
/// configuration from anywhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// External tool front-end commands.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Global compile settings shared by every target.
    #[serde(default)]
    pub compile: CompileConfig,
    /// Global elaboration settings.
    #[serde(default)]
    pub elaborate: ElaborateConfig,
    /// Global simulation settings.
    #[serde(default)]
    pub simulate: SimulateConfig,
    /// Named targets (testbench or design top plus its sources).
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
    /// Named tests, each bound to a target.
    #[serde(default)]
    pub tests: BTreeMap<String, TestConfig>,
}

impl FlowConfig {
    /// Returns the absolute build directory for a project rooted at `root`.
    pub fn build_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.project.build_dir)
    }
}

/// Core project metadata required in every `edaflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
    /// Build directory, relative to the project root.
    #[serde(default = "default_build_dir")]
    pub build_dir: String,
}

fn default_build_dir() -> String {
    "build".to_string()
}

/// Shell commands that start each external tool.
///
/// A command may contain arguments (`"vlog -sv"`); it is passed to the shell
/// verbatim and further arguments are appended after it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    /// VHDL compiler front-end.
    pub vhdl: Option<String>,
    /// Verilog compiler front-end.
    pub verilog: Option<String>,
    /// SystemVerilog compiler front-end.
    pub systemverilog: Option<String>,
    /// Elaborator.
    pub elaborate: Option<String>,
    /// Simulator.
    pub simulate: Option<String>,
    /// Verification framework bootstrap, run once before any compile batch.
    pub framework: Option<String>,
}

impl ToolsConfig {
    /// Returns the compiler front-end configured for `language`.
    pub fn front_end(&self, language: HdlLanguage) -> Option<&str> {
        let cmd = match language {
            HdlLanguage::Vhdl => self.vhdl.as_deref(),
            HdlLanguage::Verilog => self.verilog.as_deref(),
            HdlLanguage::SystemVerilog => self.systemverilog.as_deref(),
        };
        cmd.map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Global compile settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileConfig {
    /// Macro defines for verilog-family files (`NAME` or `NAME=VALUE`).
    #[serde(default)]
    pub defines: Vec<String>,
    /// Include directories for verilog-family files, relative to the project root.
    #[serde(default)]
    pub incdirs: Vec<String>,
    /// Extra options passed to every compiler invocation.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub options: Vec<String>,
    /// Language-standard flag per language name (e.g. `vhdl = "-2008"`).
    #[serde(default)]
    pub standards: BTreeMap<String, String>,
    /// Whether coverage instrumentation is enabled.
    #[serde(default)]
    pub coverage: bool,
    /// Flag emitted when coverage is enabled.
    #[serde(default = "default_coverage_flag")]
    pub coverage_flag: String,
    /// Whether debug visibility is enabled.
    #[serde(default)]
    pub debug: bool,
    /// Flag emitted when debug is enabled.
    #[serde(default = "default_debug_flag")]
    pub debug_flag: String,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            defines: Vec::new(),
            incdirs: Vec::new(),
            options: Vec::new(),
            standards: BTreeMap::new(),
            coverage: false,
            coverage_flag: default_coverage_flag(),
            debug: false,
            debug_flag: default_debug_flag(),
        }
    }
}

impl CompileConfig {
    /// Returns the language-standard flag configured for `language`.
    pub fn standard_flag(&self, language: HdlLanguage) -> Option<&str> {
        self.standards
            .iter()
            .find(|(name, _)| name.parse::<HdlLanguage>().ok() == Some(language))
            .map(|(_, flag)| flag.as_str())
    }
}

fn default_coverage_flag() -> String {
    "+cover".to_string()
}

fn default_debug_flag() -> String {
    "+acc".to_string()
}

/// Upper bound on disambiguated elaboration directories per target and test.
///
/// The directory suffix is three digits wide.
pub const ELAB_DIR_LIMIT: usize = 1000;

/// Global elaboration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ElaborateConfig {
    /// Extra options passed to every elaboration.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub options: Vec<String>,
    /// Generic/parameter overrides applied to every elaboration.
    #[serde(default)]
    pub generics: BTreeMap<String, GenericValue>,
    /// Flag prefix for generic overrides.
    #[serde(default = "default_generic_flag")]
    pub generic_flag: String,
    /// Flag prefix for a test's verbosity setting.
    #[serde(default = "default_verbosity_flag")]
    pub verbosity_flag: String,
    /// Maximum number of elaboration directories per target and test.
    #[serde(default = "default_max_dirs")]
    pub max_dirs: usize,
}

impl Default for ElaborateConfig {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            generics: BTreeMap::new(),
            generic_flag: default_generic_flag(),
            verbosity_flag: default_verbosity_flag(),
            max_dirs: default_max_dirs(),
        }
    }
}

fn default_generic_flag() -> String {
    "-g".to_string()
}

fn default_verbosity_flag() -> String {
    "+UVM_VERBOSITY=".to_string()
}

fn default_max_dirs() -> usize {
    ELAB_DIR_LIMIT
}

/// Global simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulateConfig {
    /// Extra options passed to every simulation.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub options: Vec<String>,
    /// Flag that precedes the seed value.
    #[serde(default = "default_seed_flag")]
    pub seed_flag: String,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            seed_flag: default_seed_flag(),
        }
    }
}

fn default_seed_flag() -> String {
    "-sv_seed".to_string()
}

/// A buildable target: a top-level design unit and the sources it needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Top-level design unit passed last to the elaborator.
    pub top: String,
    /// Target-level macro defines.
    #[serde(default)]
    pub defines: Vec<String>,
    /// Target-level include directories.
    #[serde(default)]
    pub incdirs: Vec<String>,
    /// Target-level compile options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub compile_options: Vec<String>,
    /// Target-level elaboration options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub elab_options: Vec<String>,
    /// Target-level simulation options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub sim_options: Vec<String>,
    /// Target-level generic overrides.
    #[serde(default)]
    pub generics: BTreeMap<String, GenericValue>,
    /// Source groups, in compile order.
    #[serde(default)]
    pub sources: Vec<SourceGroup>,
}

/// A group of source files sharing a library, language and per-file settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceGroup {
    /// Library the files compile into.
    pub library: String,
    /// Language name (`vhdl`, `verilog`, `systemverilog`).
    pub language: String,
    /// Source files, relative to the project root.
    #[serde(default)]
    pub files: Vec<String>,
    /// Optional file list (`.f`) appended after `files`.
    pub filelist: Option<String>,
    /// Per-file compile options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub options: Vec<String>,
    /// Per-file macro defines.
    #[serde(default)]
    pub defines: Vec<String>,
    /// Per-file include directories.
    #[serde(default)]
    pub incdirs: Vec<String>,
}

/// A named test bound to a target.
#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    /// Name of the target this test runs on.
    pub target: String,
    /// Random seed passed to the simulator.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Overrides the target's top-level design unit.
    pub top: Option<String>,
    /// Test-level elaboration options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub elab_options: Vec<String>,
    /// Test-level simulation options.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub sim_options: Vec<String>,
    /// Test-level generic overrides.
    #[serde(default)]
    pub generics: BTreeMap<String, GenericValue>,
    /// Verbosity level appended after all other elaboration options.
    pub verbosity: Option<String>,
}

fn default_seed() -> u64 {
    1
}

/// A generic/parameter value as written in the configuration.
///
/// TOML strings, integers, floats and booleans are all accepted and kept in
/// their textual form; quoting is decided when the command is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericValue(pub String);

impl GenericValue {
    /// Returns the value text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for GenericValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GenericVisitor;

        impl Visitor<'_> for GenericVisitor {
            type Value = GenericValue;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a string, number or boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(GenericValue(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(GenericValue(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(GenericValue(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(GenericValue(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(GenericValue(v.to_string()))
            }
        }

        deserializer.deserialize_any(GenericVisitor)
    }
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `options = "-quiet"` as well as `options = ["-quiet", "-nologo"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
