//! Named source trees.

use std::collections::HashMap;
use std::path::PathBuf;

use ilfs_common::{IlfsError, IlfsResult};

use crate::options::OptionSet;

/// A named source directory whose subtree supplies content for composed
/// paths.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Unique tree name.
    pub name: String,
    /// Absolute, symlink-resolved root directory on the host.
    pub root: PathBuf,
    /// Tree-scope options.
    pub opts: OptionSet,
}

/// Registry of source trees for one session.
#[derive(Debug, Default)]
pub struct TreeRegistry {
    trees: HashMap<String, Tree>,
}

impl TreeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tree.
    ///
    /// The name must be non-empty and unique within the session; the root
    /// must resolve (after symlink resolution) to an existing directory.
    pub fn add(&mut self, name: &str, root: &str, optstr: &str) -> IlfsResult<()> {
        if name.is_empty() {
            return Err(IlfsError::Usage {
                message: "tree name must not be empty".to_string(),
            });
        }
        if self.trees.contains_key(name) {
            return Err(IlfsError::DuplicateTree {
                name: name.to_string(),
            });
        }

        let resolved = std::fs::canonicalize(root).map_err(|_| IlfsError::InvalidTreeRoot {
            name: name.to_string(),
            root: root.to_string(),
        })?;
        if !resolved.is_dir() {
            return Err(IlfsError::InvalidTreeRoot {
                name: name.to_string(),
                root: root.to_string(),
            });
        }

        let opts = OptionSet::parse(optstr)?;
        tracing::debug!(name, root = %resolved.display(), "Tree registered");
        self.trees.insert(
            name.to_string(),
            Tree {
                name: name.to_string(),
                root: resolved,
                opts,
            },
        );
        Ok(())
    }

    /// Is `name` registered?
    #[must_use]
    pub fn defined(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    /// Look up a tree by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tree> {
        self.trees.get(name)
    }

    /// Look up a tree the registry is known to hold.
    ///
    /// Loader invariants guarantee every registered path's tree exists;
    /// a miss here is a bug, not an operator error.
    pub fn require(&self, name: &str) -> IlfsResult<&Tree> {
        self.get(name).ok_or_else(|| IlfsError::Internal {
            message: format!("tree {name:?} vanished from the registry"),
        })
    }

    /// Number of registered trees.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// True when no tree is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
