//! The session object.
//!
//! A session owns the three registries plus the global option set and is
//! passed explicitly through the loader, planner, runner and executor. The
//! registries are mutated only while loading; afterwards they are read-only
//! for the rest of the session.

use ilfs_common::{IlfsError, IlfsResult};

use crate::options::{defaults, InitPolicy, OptionKey, OptionSet, PathType, Scope};
use crate::registry::{PathRegistry, RegisteredPath, TreeRegistry};

/// Lifecycle of one composition session.
///
/// Errors from any phase move the session to [`SessionState::Failed`],
/// which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing loaded.
    Uninit,
    /// Both tables loaded and validated.
    Configured,
    /// Mountpoint placeholders prepared.
    Planned,
    /// All binds issued.
    Mounted,
    /// Torn down by explicit unmount.
    Unmounted,
    /// A fatal error occurred.
    Failed,
}

/// Session-local state: registries, global options, lifecycle.
#[derive(Debug, Default)]
pub struct Session {
    /// Named source trees.
    pub trees: TreeRegistry,
    /// Ordered composed paths.
    pub paths: PathRegistry,
    /// The global (`-o`) option scope.
    pub globals: OptionSet,
    state: Option<SessionState>,
}

impl Session {
    /// Create an empty session in the `uninit` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.unwrap_or(SessionState::Uninit)
    }

    /// Advance the lifecycle.
    pub fn set_state(&mut self, state: SessionState) {
        tracing::debug!(?state, "Session state");
        self.state = Some(state);
    }

    /// Parse one `-o` string into the global scope; repeated calls
    /// concatenate, later keys winning.
    pub fn push_global_opts(&mut self, optstr: &str) -> IlfsResult<()> {
        let parsed = OptionSet::parse(optstr)?;
        self.globals.merge_from(&parsed);
        Ok(())
    }

    fn scoped<'a>(&'a self, scope: Scope, entry: &'a RegisteredPath) -> Option<&'a OptionSet> {
        match scope {
            Scope::Defaults => None,
            Scope::Global => Some(&self.globals),
            Scope::Tree => self.trees.get(&entry.tree).map(|t| &t.opts),
            Scope::Path => Some(&entry.opts),
        }
    }

    fn resolve_with<T: Copy>(
        &self,
        path: &str,
        key: OptionKey,
        default: T,
        pick: impl Fn(&OptionSet) -> Option<T>,
    ) -> IlfsResult<T> {
        let entry = self.paths.get(path).ok_or_else(|| IlfsError::Internal {
            message: format!("option resolution for unregistered path {path:?}"),
        })?;
        let mut value = default;
        for scope in key.precedence() {
            if let Some(set) = self.scoped(scope, entry) {
                if let Some(v) = pick(set) {
                    value = v;
                }
            }
        }
        Ok(value)
    }

    /// Effective read-only policy for a registered path.
    pub fn effective_ro(&self, path: &str) -> IlfsResult<bool> {
        self.resolve_with(path, OptionKey::Ro, defaults::RO, |s| s.ro)
    }

    /// Effective initializer policy for a registered path.
    pub fn effective_init(&self, path: &str) -> IlfsResult<InitPolicy> {
        self.resolve_with(path, OptionKey::Init, defaults::INIT, |s| s.init)
    }

    /// Effective declared type for a registered path.
    pub fn effective_type(&self, path: &str) -> IlfsResult<PathType> {
        self.resolve_with(path, OptionKey::Type, defaults::TYPE, |s| s.path_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session_with(path_opts: &str, tree_opts: &str, global_opts: &str) -> Session {
        let dir = tempdir().unwrap();
        let mut s = Session::new();
        s.trees
            .add("src", dir.path().to_str().unwrap(), tree_opts)
            .unwrap();
        s.push_global_opts(global_opts).unwrap();
        s.paths
            .add(RegisteredPath {
                path: "/".to_string(),
                tree: "src".to_string(),
                initcmd: String::new(),
                opts: OptionSet::parse(path_opts).unwrap(),
                from_glob: false,
            })
            .unwrap();
        drop(dir);
        s
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = session_with("", "", "");
        assert!(!s.effective_ro("/").unwrap());
        assert_eq!(s.effective_init("/").unwrap(), InitPolicy::Never);
        assert_eq!(s.effective_type("/").unwrap(), PathType::Either);
    }

    #[test]
    fn global_ro_overrides_path_rw() {
        let s = session_with("rw", "", "ro");
        assert!(s.effective_ro("/").unwrap());
    }

    #[test]
    fn tree_ro_beats_path_rw() {
        // For ro the path scope is the weakest override.
        let s = session_with("rw", "ro", "");
        assert!(s.effective_ro("/").unwrap());

        let s = session_with("rw", "", "");
        assert!(!s.effective_ro("/").unwrap());
    }

    #[test]
    fn specific_scope_wins_for_init_and_type() {
        let s = session_with("init=always,type=f", "init=missing,type=d", "init=skip");
        assert_eq!(s.effective_init("/").unwrap(), InitPolicy::Always);
        assert_eq!(s.effective_type("/").unwrap(), PathType::File);

        let s = session_with("", "init=missing", "init=skip");
        assert_eq!(s.effective_init("/").unwrap(), InitPolicy::Missing);

        let s = session_with("", "", "init=skip");
        assert_eq!(s.effective_init("/").unwrap(), InitPolicy::Skip);
    }

    #[test]
    fn unregistered_path_is_internal() {
        let s = session_with("", "", "");
        assert!(matches!(
            s.effective_ro("/nope").unwrap_err(),
            IlfsError::Internal { .. }
        ));
    }

    #[test]
    fn state_starts_uninit() {
        let s = Session::new();
        assert_eq!(s.state(), SessionState::Uninit);
    }
}
