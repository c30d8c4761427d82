//! The ordered registry of composed paths.

use std::collections::HashMap;

use ilfs_common::{pathutil, IlfsError, IlfsResult};

use crate::options::OptionSet;

/// One composed path, bound to exactly one tree.
#[derive(Debug, Clone)]
pub struct RegisteredPath {
    /// Normalized absolute composed path.
    pub path: String,
    /// Name of the source tree supplying this path.
    pub tree: String,
    /// Initializer command, verbatim from the table; may be empty.
    pub initcmd: String,
    /// Path-scope option overrides.
    pub opts: OptionSet,
    /// Whether this path came from a glob expansion.
    pub from_glob: bool,
}

/// Ordered list of composed paths; insertion order is the mount order.
#[derive(Debug, Default)]
pub struct PathRegistry {
    list: Vec<RegisteredPath>,
    index: HashMap<String, usize>,
}

/// Does `q` equal or descend from `p`?
///
/// The comparison appends `/` to both sides, which makes the root path
/// shadow nothing but itself: every composition nests under `/` by
/// construction.
fn within(q: &str, p: &str) -> bool {
    let q = format!("{q}/");
    let p = format!("{p}/");
    q.starts_with(&p)
}

impl PathRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path, rejecting shadowed registrations.
    ///
    /// A new path must not equal or descend from any earlier one.
    pub fn add(&mut self, entry: RegisteredPath) -> IlfsResult<()> {
        if let Some(prior) = self.shadowed_by(&entry.path) {
            return Err(IlfsError::PathShadow {
                path: entry.path.clone(),
                prior: prior.to_string(),
            });
        }
        tracing::debug!(path = %entry.path, tree = %entry.tree, "Path registered");
        self.index.insert(entry.path.clone(), self.list.len());
        self.list.push(entry);
        Ok(())
    }

    /// Earlier path that `p` equals or descends from, if any.
    #[must_use]
    pub fn shadowed_by(&self, p: &str) -> Option<&str> {
        self.list
            .iter()
            .find(|e| within(p, &e.path))
            .map(|e| e.path.as_str())
    }

    /// Is any stored path equal to `p` or a descendant of it?
    #[must_use]
    pub fn has_subpath(&self, p: &str) -> bool {
        self.list.iter().any(|e| within(&e.path, p))
    }

    /// Nearest registered strict ancestor of `p`.
    ///
    /// Walks the parent chain up to and including `/`; returns `None` when
    /// nothing on the chain is registered.
    #[must_use]
    pub fn parent_in_registry(&self, p: &str) -> Option<&RegisteredPath> {
        let mut cur = pathutil::parent(p);
        loop {
            if let Some(entry) = self.get(&cur) {
                return Some(entry);
            }
            if cur == "/" {
                return None;
            }
            cur = pathutil::parent(&cur);
        }
    }

    /// Is `p` registered?
    #[must_use]
    pub fn defined(&self, p: &str) -> bool {
        self.index.contains_key(p)
    }

    /// Look up a registered path.
    #[must_use]
    pub fn get(&self, p: &str) -> Option<&RegisteredPath> {
        self.index.get(p).map(|&i| &self.list[i])
    }

    /// Iterate paths in registration (= mount) order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPath> {
        self.list.iter()
    }

    /// Number of registered paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True when no path is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
