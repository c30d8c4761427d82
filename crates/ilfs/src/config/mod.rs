//! Loading of the two configuration tables.
//!
//! Both tables pass through the template substitutor as a whole stream,
//! then split into lines. A non-blank, non-comment line is tokenized into
//! a bounded number of whitespace-separated fields; a field starting with
//! `#` ends the record, and the paths table captures everything after its
//! option field verbatim as the initializer command.

use std::io::Read;

use ilfs_common::pathutil::{self, ProbeError};
use ilfs_common::template;
use ilfs_common::{IlfsError, IlfsResult};

use crate::options::{defaults, InitPolicy, OptionSet, PathType};
use crate::registry::RegisteredPath;
use crate::session::Session;

/// `NAME ROOT [OPTS]`
const TREE_FIELDS: usize = 3;
/// `TREE PATHSPEC [OPTS]`, remainder is the initializer command.
const PATH_FIELDS: usize = 3;

/// Split a record line into at most `max` fields.
///
/// A field starting with `#` ends the record. Tokens past `max` are
/// returned verbatim (trailing whitespace trimmed) as the rest.
fn split_record(line: &str, max: usize) -> (Vec<&str>, Option<&str>) {
    let mut fields = Vec::new();
    let mut pos = 0;

    loop {
        let tail = &line[pos..];
        let skipped = tail.len() - tail.trim_start().len();
        pos += skipped;
        if pos >= line.len() {
            break;
        }
        if line[pos..].starts_with('#') {
            break;
        }
        if fields.len() == max {
            return (fields, Some(line[pos..].trim_end()));
        }
        let start = pos;
        pos += line[pos..]
            .find(char::is_whitespace)
            .unwrap_or(line.len() - pos);
        fields.push(&line[start..pos]);
    }
    (fields, None)
}

/// Load the trees table from a byte stream, substituting `${VAR}` from the
/// process environment.
pub fn load_trees(session: &mut Session, reader: &mut dyn Read) -> IlfsResult<()> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    load_trees_str(session, &text, |name| std::env::var(name).ok())
}

/// Load the trees table from text with an injected variable source.
pub fn load_trees_str<F>(session: &mut Session, text: &str, lookup: F) -> IlfsResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = template::substitute(text, lookup).map_err(IlfsError::from)?;
    for (idx, line) in expanded.lines().enumerate() {
        tree_line(session, line).map_err(|e| e.at_line(idx + 1))?;
    }
    tracing::debug!(count = session.trees.len(), "Trees loaded");
    Ok(())
}

fn tree_line(session: &mut Session, line: &str) -> IlfsResult<()> {
    let (fields, rest) = split_record(line, TREE_FIELDS);
    if fields.is_empty() {
        return Ok(());
    }
    if let Some(rest) = rest {
        return Err(IlfsError::Usage {
            message: format!("unexpected trailing fields: {rest:?}"),
        });
    }
    let name = fields[0];
    let Some(root) = fields.get(1) else {
        return Err(IlfsError::Usage {
            message: format!("missing root for tree {name:?}"),
        });
    };
    let optstr = fields.get(2).copied().unwrap_or("");
    session.trees.add(name, root, optstr)
}

/// Load the paths table from a byte stream, substituting `${VAR}` from the
/// process environment.
pub fn load_paths(session: &mut Session, reader: &mut dyn Read) -> IlfsResult<()> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    load_paths_str(session, &text, |name| std::env::var(name).ok())
}

/// Load the paths table from text with an injected variable source.
pub fn load_paths_str<F>(session: &mut Session, text: &str, lookup: F) -> IlfsResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = template::substitute(text, lookup).map_err(IlfsError::from)?;
    for (idx, line) in expanded.lines().enumerate() {
        path_line(session, line).map_err(|e| e.at_line(idx + 1))?;
    }
    tracing::debug!(count = session.paths.len(), "Paths loaded");
    Ok(())
}

fn path_line(session: &mut Session, line: &str) -> IlfsResult<()> {
    let (fields, rest) = split_record(line, PATH_FIELDS);
    if fields.is_empty() {
        return Ok(());
    }
    let tree_name = fields[0];
    let Some(rawspec) = fields.get(1) else {
        return Err(IlfsError::Usage {
            message: format!("missing path spec for tree {tree_name:?}"),
        });
    };
    let optstr = fields.get(2).copied().unwrap_or("");
    let initcmd = rest.unwrap_or("").to_string();

    let tree = session
        .trees
        .get(tree_name)
        .cloned()
        .ok_or_else(|| IlfsError::UnknownTree {
            name: tree_name.to_string(),
        })?;

    let mut opts = OptionSet::parse(optstr)?;

    let is_glob = pathutil::contains_glob(rawspec);
    if is_glob {
        match opts.init {
            None => opts.init = Some(InitPolicy::Skip),
            Some(InitPolicy::Skip | InitPolicy::Never) => {}
            Some(_) => {
                return Err(IlfsError::InitForbiddenOnGlob {
                    path: (*rawspec).to_string(),
                });
            }
        }
    }

    let mut spec = (*rawspec).to_string();
    if spec.len() > 1 && spec.ends_with('/') {
        // A trailing slash pins the type to directory.
        match opts.path_type {
            None | Some(PathType::Dir) | Some(PathType::Either) => {}
            Some(PathType::File) => {
                return Err(IlfsError::InvalidOptionValue {
                    name: "type".to_string(),
                    value: "f".to_string(),
                });
            }
        }
        opts.path_type = Some(PathType::Dir);
        while spec.len() > 1 && spec.ends_with('/') {
            spec.pop();
        }
    }

    if !spec.starts_with('/') {
        spec.insert(0, '/');
    }
    if !pathutil::validate(&spec) {
        return Err(IlfsError::PathInvalid { path: spec });
    }

    // Path scope wins over tree over global for init and type.
    let effective_init = opts
        .init
        .or(tree.opts.init)
        .or(session.globals.init)
        .unwrap_or(defaults::INIT);
    let effective_type = opts
        .path_type
        .or(tree.opts.path_type)
        .or(session.globals.path_type)
        .unwrap_or(defaults::TYPE);

    let expansion: Vec<String> = if is_glob {
        pathutil::expand_glob(&tree.root, &spec[1..])?
            .into_iter()
            .map(|m| format!("/{m}"))
            .collect()
    } else {
        let src = pathutil::source_path(&tree.root, &spec);
        if let Err(ProbeError::NotFound(_)) = pathutil::ospath_type(&src) {
            if !effective_init.tolerates_missing() {
                return Err(IlfsError::PathNoMatch { path: spec });
            }
        }
        vec![spec]
    };

    for path in expansion {
        if !pathutil::validate(&path) {
            return Err(IlfsError::PathInvalid { path });
        }
        match pathutil::ospath_type(&pathutil::source_path(&tree.root, &path)) {
            Ok(kind) if !effective_type.matches(kind) => {
                return Err(IlfsError::PathTypeMismatch {
                    path,
                    expected: effective_type.to_string(),
                    actual: kind.to_string(),
                });
            }
            Ok(_) | Err(ProbeError::NotFound(_)) => {}
            Err(ProbeError::Symlink(_)) => {
                return Err(IlfsError::PathTypeMismatch {
                    path,
                    expected: effective_type.to_string(),
                    actual: "symlink".to_string(),
                });
            }
            Err(ProbeError::Unsupported(_)) => {
                return Err(IlfsError::PathTypeMismatch {
                    path,
                    expected: effective_type.to_string(),
                    actual: "unsupported".to_string(),
                });
            }
            Err(ProbeError::Io(e)) => return Err(e.into()),
        }
        session.paths.add(RegisteredPath {
            path,
            tree: tree.name.clone(),
            initcmd: initcmd.clone(),
            opts: opts.clone(),
            from_glob: is_glob,
        })?;
    }
    Ok(())
}
