//! HDL language tags with string parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The hardware description language of a source file.
///
/// Verilog and SystemVerilog form the "verilog family": they share macro
/// defines and include directories, which VHDL does not have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HdlLanguage {
    /// VHDL (any standard revision).
    Vhdl,
    /// Verilog-2005.
    Verilog,
    /// SystemVerilog.
    SystemVerilog,
}

impl HdlLanguage {
    /// All supported languages, in a stable order.
    pub const ALL: [HdlLanguage; 3] = [
        HdlLanguage::Vhdl,
        HdlLanguage::Verilog,
        HdlLanguage::SystemVerilog,
    ];

    /// Returns `true` for Verilog and SystemVerilog.
    pub fn is_verilog_family(self) -> bool {
        matches!(self, HdlLanguage::Verilog | HdlLanguage::SystemVerilog)
    }

    /// The canonical lowercase name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            HdlLanguage::Vhdl => "vhdl",
            HdlLanguage::Verilog => "verilog",
            HdlLanguage::SystemVerilog => "systemverilog",
        }
    }
}

impl fmt::Display for HdlLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing language tags.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HDL language: '{input}'")]
pub struct ParseLanguageError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for HdlLanguage {
    type Err = ParseLanguageError;

    /// Accepts the canonical names plus the common short forms
    /// (`vhd`, `v`, `sv`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vhdl" | "vhd" => Ok(HdlLanguage::Vhdl),
            "verilog" | "v" => Ok(HdlLanguage::Verilog),
            "systemverilog" | "sv" => Ok(HdlLanguage::SystemVerilog),
            _ => Err(ParseLanguageError {
                input: s.to_string(),
            }),
        }
    }
}
