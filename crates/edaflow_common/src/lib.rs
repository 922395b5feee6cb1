//! Shared foundational types used across the edaflow toolchain harness.
//!
//! This crate provides HDL language tags, the source catalog record consumed
//! by the compile engine, layered option merging, and the single place where
//! filesystem modification times are read and compared.

#![warn(missing_docs)]

pub mod language;
pub mod merge;
pub mod mtime;
pub mod source_file;

pub use language::{HdlLanguage, ParseLanguageError};
pub use merge::{merge_defines, merge_unique};
pub use source_file::SourceFile;
