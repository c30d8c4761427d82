//! POSIX-style path helpers.
//!
//! This module handles:
//! - Lexical parent/leaf splitting with shell-compatible edge cases
//! - The composed-path grammar check
//! - Glob classification and expansion
//! - Filesystem type probing

use std::path::{Path, PathBuf};

use crate::error::{IlfsError, IlfsResult};

/// What a filesystem probe found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A directory.
    Dir,
    /// A regular file.
    File,
}

impl PathKind {
    /// Single-letter spelling used in configuration and diagnostics.
    #[must_use]
    pub fn letter(self) -> char {
        match self {
            PathKind::Dir => 'd',
            PathKind::File => 'f',
        }
    }
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Failure modes of [`ospath_type`].
///
/// Absence, symlinks and unsupported object types are distinct so callers
/// can treat "not there yet" differently from "there but unusable".
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Nothing exists at the path.
    #[error("no such path: {0}")]
    NotFound(PathBuf),
    /// The path is a symlink; the composer refuses to route through them.
    #[error("symlink not supported: {0}")]
    Symlink(PathBuf),
    /// The path is neither a directory nor a regular file.
    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),
    /// The probe itself failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Lexical parent of `p`.
///
/// Trailing slashes are stripped first, then the last component. Absolute
/// inputs bottom out at `/`, relative inputs at `.`.
#[must_use]
pub fn parent(p: &str) -> String {
    let trimmed = p.trim_end_matches('/');
    if trimmed.is_empty() {
        // All slashes, or empty input.
        return if p.starts_with('/') { "/" } else { "." }.to_string();
    }
    match trimmed.rfind('/') {
        None => ".".to_string(),
        Some(0) => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// Lexical last component of `p`.
///
/// `/` stays `/`, `.` stays `.`, empty stays empty.
#[must_use]
pub fn leaf(p: &str) -> String {
    let trimmed = p.trim_end_matches('/');
    if trimmed.is_empty() {
        return if p.starts_with('/') { "/" } else { "" }.to_string();
    }
    match trimmed.rfind('/') {
        None => trimmed.to_string(),
        Some(idx) => trimmed[idx + 1..].to_string(),
    }
}

/// Check `p` against the composed-path grammar.
///
/// Accepts `/` and any `/`-separated sequence of components that are not
/// empty, `.` or `..`, with at most one trailing slash. Purely lexical; no
/// filesystem access.
#[must_use]
pub fn validate(p: &str) -> bool {
    if p == "/" {
        return true;
    }
    if !p.starts_with('/') {
        return false;
    }
    let q = p.strip_suffix('/').unwrap_or(p);
    q[1..]
        .split('/')
        .all(|comp| !comp.is_empty() && comp != "." && comp != "..")
}

/// Does `s` contain unescaped glob metacharacters?
///
/// Recognized: `*`, `?`, a `[...]` bracket whose unescaped closer sits in
/// the same component, and the extglob groups `+(...)`, `@(...)`, `!(...)`.
/// A backslash escapes the following character.
#[must_use]
pub fn contains_glob(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    while i < b.len() {
        match b[i] {
            b'\\' => i += 2,
            b'*' | b'?' => return true,
            b'[' => {
                // A bracket counts only if an unescaped ']' closes it
                // before the component ends. The first ']' after '[' is a
                // literal member, not a closer.
                let mut j = i + 1;
                while j < b.len() {
                    match b[j] {
                        b'\\' => j += 2,
                        b'/' => break,
                        b']' if j > i + 1 => return true,
                        _ => j += 1,
                    }
                }
                i += 1;
            }
            b'+' | b'@' | b'!' if i + 1 < b.len() && b[i + 1] == b'(' => {
                let mut j = i + 2;
                while j < b.len() {
                    match b[j] {
                        b'\\' => j += 2,
                        b')' => return true,
                        _ => j += 1,
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    false
}

/// Enumerate filesystem matches of `pattern` relative to `cwd`.
///
/// Dot-files are included, symlinks are not followed for descent, and no
/// match yields an empty list. Results are relative to `cwd`, in sorted
/// order. The caller's process state (working directory, umask) is never
/// touched.
pub fn expand_glob(cwd: &Path, pattern: &str) -> IlfsResult<Vec<String>> {
    let Some(base) = cwd.to_str() else {
        return Err(IlfsError::PathInvalid {
            path: cwd.to_string_lossy().into_owned(),
        });
    };
    // Only the pattern half may glob; the base directory is literal.
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(base.trim_end_matches('/')),
        pattern
    );
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let entries = glob::glob_with(&full, options).map_err(|e| IlfsError::PathInvalid {
        path: format!("{pattern}: {e}"),
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        // Unreadable directories are skipped, as a shell would.
        let Ok(path) = entry else { continue };
        let rel = path.strip_prefix(cwd).unwrap_or(&path);
        if let Some(rel) = rel.to_str() {
            matches.push(rel.to_string());
        }
    }
    Ok(matches)
}

/// Probe the filesystem object at `p`.
///
/// Returns its [`PathKind`]; symlinks, absent entries and other object
/// types each fail distinctly.
pub fn ospath_type(p: &Path) -> Result<PathKind, ProbeError> {
    let meta = std::fs::symlink_metadata(p).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::NotFound(p.to_path_buf())
        } else {
            ProbeError::Io(e)
        }
    })?;
    let ft = meta.file_type();
    if ft.is_symlink() {
        Err(ProbeError::Symlink(p.to_path_buf()))
    } else if ft.is_dir() {
        Ok(PathKind::Dir)
    } else if ft.is_file() {
        Ok(PathKind::File)
    } else {
        Err(ProbeError::Unsupported(p.to_path_buf()))
    }
}

/// Join a composed absolute path onto a tree root.
///
/// `/` maps to the root itself.
#[must_use]
pub fn source_path(root: &Path, composed: &str) -> PathBuf {
    match composed.strip_prefix('/') {
        Some("") | None => root.to_path_buf(),
        Some(rel) => root.join(rel),
    }
}
