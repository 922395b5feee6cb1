//! Flattening of hierarchical HDL file lists (`.f` files).
//!
//! A file list holds one entry per line:
//!
//! - a source path, relative to the list's own directory unless absolute,
//! - `-f <list>` or `-F <list>` to include another list,
//! - `+incdir+<dir>[+<dir>...]` and `+define+<NAME>[=<VALUE>][+...]`.
//!
//! `#` and `//` start comments. `$VAR` and `${VAR}` are expanded from the
//! environment; an undefined variable is an error.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// The flattened contents of a file list and everything it includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileList {
    /// Source files in list order.
    pub files: Vec<PathBuf>,
    /// Include directories declared by `+incdir+`.
    pub incdirs: Vec<PathBuf>,
    /// Macro defines declared by `+define+`.
    pub defines: Vec<String>,
}

/// Reads `path` and every list it includes, returning the flattened result.
pub fn parse_filelist(path: &Path) -> Result<FileList, ConfigError> {
    let mut out = FileList::default();
    let mut stack = Vec::new();
    parse_into(path, &mut out, &mut stack)?;
    Ok(out)
}

fn parse_into(path: &Path, out: &mut FileList, stack: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let err = |reason: String| ConfigError::FileList {
        path: path.to_path_buf(),
        reason,
    };

    if stack.iter().any(|p| p == path) {
        return Err(err(format!("cycle through {}", path.display())));
    }
    let content = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
    let base = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    stack.push(path.to_path_buf());

    for (idx, raw) in content.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let line = expand_env(line).map_err(|var| {
            err(format!("line {}: undefined variable '{var}'", idx + 1))
        })?;

        if let Some(rest) = line
            .strip_prefix("-f ")
            .or_else(|| line.strip_prefix("-F "))
        {
            let nested = base.join(rest.trim());
            parse_into(&nested, out, stack)?;
        } else if let Some(rest) = line.strip_prefix("+incdir+") {
            out.incdirs.extend(
                rest.split('+')
                    .filter(|d| !d.is_empty())
                    .map(|d| base.join(d)),
            );
        } else if let Some(rest) = line.strip_prefix("+define+") {
            out.defines.extend(
                rest.split('+')
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        } else if line.starts_with('-') || line.starts_with('+') {
            return Err(err(format!(
                "line {}: unsupported directive '{line}'",
                idx + 1
            )));
        } else {
            out.files.push(base.join(&line));
        }
    }

    stack.pop();
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    let cut = [line.find('#'), line.find("//")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

/// Expands `$VAR` and `${VAR}` references. Returns the name of the first
/// undefined variable on failure.
fn expand_env(line: &str) -> Result<String, String> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => return Err(braced.to_string()),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };
        if name.is_empty() {
            out.push('$');
            rest = after;
            continue;
        }
        let value = std::env::var(name).map_err(|_| name.to_string())?;
        out.push_str(&value);
        rest = &after[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn flat_list_with_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("dut.f");
        fs::write(
            &list,
            "# dut sources\na.vhd\n\n  b.vhd  // trailing comment\n/abs/c.vhd\n",
        )
        .unwrap();
        let fl = parse_filelist(&list).unwrap();
        assert_eq!(
            fl.files,
            vec![
                dir.path().join("a.vhd"),
                dir.path().join("b.vhd"),
                PathBuf::from("/abs/c.vhd"),
            ]
        );
    }

    #[test]
    fn nested_lists_resolve_relative_to_their_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("ip");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("ip.f"), "fifo.sv\n+incdir+inc\n").unwrap();
        fs::write(
            dir.path().join("top.f"),
            "pkg.sv\n-f ip/ip.f\ntop.sv\n+define+SIM+WIDTH=8\n",
        )
        .unwrap();
        let fl = parse_filelist(&dir.path().join("top.f")).unwrap();
        assert_eq!(
            fl.files,
            vec![
                dir.path().join("pkg.sv"),
                sub.join("fifo.sv"),
                dir.path().join("top.sv"),
            ]
        );
        assert_eq!(fl.incdirs, vec![sub.join("inc")]);
        assert_eq!(fl.defines, vec!["SIM", "WIDTH=8"]);
    }

    #[test]
    fn cycle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.f"), "-f b.f\n").unwrap();
        fs::write(dir.path().join("b.f"), "-f a.f\n").unwrap();
        let err = parse_filelist(&dir.path().join("a.f")).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn unsupported_directive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.f"), "-y libdir\n").unwrap();
        let err = parse_filelist(&dir.path().join("a.f")).unwrap_err();
        assert!(err.to_string().contains("unsupported directive"));
    }

    #[test]
    fn missing_list_is_an_error() {
        let err = parse_filelist(Path::new("/nonexistent/list.f")).unwrap_err();
        assert!(matches!(err, ConfigError::FileList { .. }));
    }

    #[test]
    fn expand_env_forms() {
        std::env::set_var("EDAFLOW_TEST_IP", "/opt/ip");
        assert_eq!(expand_env("$EDAFLOW_TEST_IP/a.sv").unwrap(), "/opt/ip/a.sv");
        assert_eq!(
            expand_env("${EDAFLOW_TEST_IP}_v2/a.sv").unwrap(),
            "/opt/ip_v2/a.sv"
        );
        assert_eq!(expand_env("cost$/a").unwrap(), "cost$/a");
        assert_eq!(
            expand_env("$EDAFLOW_TEST_UNDEFINED_VAR/a").unwrap_err(),
            "EDAFLOW_TEST_UNDEFINED_VAR"
        );
    }
}
