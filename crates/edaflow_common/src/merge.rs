//! Layered option merging.
//!
//! Options, include directories and macro defines are declared at several
//! levels (global, target, file or test). Layers are passed lowest precedence
//! first. The merged output keeps first-appearance order so that the
//! generated command text is stable across runs.

/// Merges layers, dropping exact duplicates.
///
/// Each distinct item appears once, at the position of its first occurrence.
pub fn merge_unique<T: Clone + PartialEq>(layers: &[&[T]]) -> Vec<T> {
    let mut merged: Vec<T> = Vec::new();
    for layer in layers {
        for item in layer.iter() {
            if !merged.contains(item) {
                merged.push(item.clone());
            }
        }
    }
    merged
}

/// Merges macro define layers keyed by macro name.
///
/// A define is either `NAME` or `NAME=VALUE`. When a higher layer redefines
/// a name, its spelling replaces the earlier one in place.
pub fn merge_defines(layers: &[&[String]]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for layer in layers {
        for define in layer.iter() {
            let define = define.trim();
            if define.is_empty() {
                continue;
            }
            let name = define_name(define);
            match merged.iter_mut().find(|d| define_name(d) == name) {
                Some(existing) => *existing = define.to_string(),
                None => merged.push(define.to_string()),
            }
        }
    }
    merged
}

fn define_name(define: &str) -> &str {
    define.split_once('=').map_or(define, |(name, _)| name).trim()
}
