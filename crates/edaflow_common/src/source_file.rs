//! Source catalog entries.

use crate::language::HdlLanguage;
use crate::mtime;
use std::path::PathBuf;
use std::time::SystemTime;

/// One HDL source file in a target's flattened source catalog.
///
/// Catalog order is significant: files are compiled in the order they appear,
/// which carries any compile-order dependency between units of one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Library (compilation namespace) the file is compiled into.
    pub library: String,
    /// HDL language of the file.
    pub language: HdlLanguage,
    /// Extra compiler options for this file only.
    pub options: Vec<String>,
    /// Include directories declared for this file (verilog family only).
    pub incdirs: Vec<PathBuf>,
    /// Macro defines for this file, as `NAME` or `NAME=VALUE` (verilog family only).
    pub defines: Vec<String>,
    /// Modification time captured when the catalog was built.
    pub modified: Option<SystemTime>,
}

impl SourceFile {
    /// Creates a catalog entry with no per-file settings, reading the
    /// file's modification time from disk.
    pub fn new(path: impl Into<PathBuf>, library: impl Into<String>, language: HdlLanguage) -> Self {
        let path = path.into();
        let modified = mtime::modified(&path);
        Self {
            path,
            library: library.into(),
            language,
            options: Vec::new(),
            incdirs: Vec::new(),
            defines: Vec::new(),
            modified,
        }
    }

    /// Returns `true` if the file is Verilog or SystemVerilog.
    pub fn is_verilog_family(&self) -> bool {
        self.language.is_verilog_family()
    }
}
