//! Initializer execution.
//!
//! A path whose source object is missing (or whose policy is `always`) is
//! handed to its initializer command: an opaque shell snippet spawned as
//! `sh -c CMD init RELPATH` with the tree root as working directory, umask
//! 022, and the `ILFS_*` contract environment. After the command reports
//! success the source object must exist and match the declared type.

pub mod actions;

use std::os::unix::process::CommandExt;
use std::process::Command;

use ilfs_common::pathutil::{self, PathKind, ProbeError};
use ilfs_common::{IlfsError, IlfsResult};

use crate::options::InitPolicy;
use crate::registry::RegisteredPath;
use crate::session::Session;

/// Which operation the initializers run under; exported as `ILFS_OP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpContext {
    /// Standalone initializer pass (`-i`).
    Init,
    /// Initializers running as part of a mount.
    Mount,
}

impl OpContext {
    fn as_str(self) -> &'static str {
        match self {
            OpContext::Init => "init",
            OpContext::Mount => "mount",
        }
    }
}

/// Run initializers over all registered paths, in order.
pub fn run_initializers(session: &Session, op: OpContext) -> IlfsResult<()> {
    for entry in session.paths.iter() {
        run_one(session, entry, op)?;
    }
    Ok(())
}

fn probe_source(src: &std::path::Path, path: &str) -> IlfsResult<Option<PathKind>> {
    match pathutil::ospath_type(src) {
        Ok(kind) => Ok(Some(kind)),
        Err(ProbeError::NotFound(_)) => Ok(None),
        Err(e @ (ProbeError::Symlink(_) | ProbeError::Unsupported(_))) => {
            Err(IlfsError::PathTypeMismatch {
                path: path.to_string(),
                expected: "d or f".to_string(),
                actual: e.to_string(),
            })
        }
        Err(ProbeError::Io(e)) => Err(e.into()),
    }
}

fn run_one(session: &Session, entry: &RegisteredPath, op: OpContext) -> IlfsResult<()> {
    let tree = session.trees.require(&entry.tree)?;
    let src = pathutil::source_path(&tree.root, &entry.path);
    let existing = probe_source(&src, &entry.path)?;

    let policy = session.effective_init(&entry.path)?;
    if existing.is_some() && policy != InitPolicy::Always {
        return Ok(());
    }
    if !policy.may_initialize() {
        return Err(IlfsError::InitRequiredMissing {
            path: entry.path.clone(),
            policy: policy.to_string(),
        });
    }
    if entry.initcmd.trim().is_empty() {
        return Err(IlfsError::InitBlankCommand {
            path: entry.path.clone(),
        });
    }

    let declared = session.effective_type(&entry.path)?;
    let readonly = session.effective_ro(&entry.path)?;
    let relpath = if entry.path == "/" {
        ".".to_string()
    } else {
        entry.path[1..].to_string()
    };
    let (existing_relpath, init_subpath) = split_existing(&tree.root, &relpath);

    tracing::info!(path = %entry.path, cmd = %entry.initcmd, "Running initializer");
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&entry.initcmd)
        .arg("init")
        .arg(&relpath)
        .current_dir(&tree.root)
        .env("ILFS_OP", op.as_str())
        .env("ILFS_TREE", &entry.tree)
        .env("ILFS_TREE_ROOT", &tree.root)
        .env("ILFS_PATH", &entry.path)
        .env("ILFS_RELPATH", &relpath)
        .env("ILFS_EXISTING_RELPATH", &existing_relpath)
        .env("ILFS_INIT_SUBPATH", &init_subpath)
        .env("ILFS_PATH_OPTS_RO", if readonly { "1" } else { "0" })
        .env("ILFS_PATH_OPTS_INIT", policy.to_string())
        .env("ILFS_PATH_OPTS_TYPE", declared.to_string());
    unsafe {
        cmd.pre_exec(|| {
            rustix::process::umask(rustix::fs::Mode::from_bits_truncate(0o022));
            Ok(())
        });
    }

    let status = cmd.status().map_err(|e| IlfsError::InitFailed {
        path: entry.path.clone(),
        detail: format!("spawn: {e}"),
    })?;
    if !status.success() {
        return Err(IlfsError::InitFailed {
            path: entry.path.clone(),
            detail: match status.code() {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            },
        });
    }

    // The command claims success; hold it to the declared type.
    match pathutil::ospath_type(&src) {
        Ok(kind) if declared.matches(kind) => Ok(()),
        Ok(kind) => Err(IlfsError::InitResultMismatch {
            path: entry.path.clone(),
            detail: format!("declared {declared}, produced {kind}"),
        }),
        Err(e) => Err(IlfsError::InitResultMismatch {
            path: entry.path.clone(),
            detail: e.to_string(),
        }),
    }
}

/// Split `relpath` into its longest leading prefix that exists as a
/// directory under `root` (`.` when none does) and the remainder the
/// initializer is responsible for creating.
fn split_existing(root: &std::path::Path, relpath: &str) -> (String, String) {
    if relpath == "." {
        return (".".to_string(), String::new());
    }
    let comps: Vec<&str> = relpath.split('/').collect();
    let mut existing = String::new();
    let mut consumed = 0;
    for (i, comp) in comps.iter().enumerate() {
        let candidate = if existing.is_empty() {
            (*comp).to_string()
        } else {
            format!("{existing}/{comp}")
        };
        if root.join(&candidate).is_dir() {
            existing = candidate;
            consumed = i + 1;
        } else {
            break;
        }
    }
    let subpath = comps[consumed..].join("/");
    if existing.is_empty() {
        existing = ".".to_string();
    }
    (existing, subpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    use crate::config;
    use crate::session::Session;

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    fn session_with_paths(pathfile: &str) -> (Session, TempDir) {
        let dir = tempdir().unwrap();
        let mut s = Session::new();
        let trees = format!("src {}\n", dir.path().display());
        config::load_trees_str(&mut s, &trees, no_vars).unwrap();
        config::load_paths_str(&mut s, pathfile, no_vars).unwrap();
        (s, dir)
    }

    #[test]
    fn split_existing_prefix() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app/data")).unwrap();

        assert_eq!(
            split_existing(dir.path(), "app/data/srcdata"),
            ("app/data".to_string(), "srcdata".to_string())
        );
        assert_eq!(
            split_existing(dir.path(), "fresh/sub"),
            (".".to_string(), "fresh/sub".to_string())
        );
        assert_eq!(
            split_existing(dir.path(), "app/data"),
            ("app/data".to_string(), String::new())
        );
        assert_eq!(split_existing(dir.path(), "."), (".".to_string(), String::new()));
    }

    #[test]
    fn missing_path_is_created_by_initcmd() {
        let (s, dir) = session_with_paths(
            "src /work/cache init=missing,type=d mkdir -p -- \"\\$1\"\n",
        );
        run_initializers(&s, OpContext::Mount).unwrap();
        assert!(dir.path().join("work/cache").is_dir());
    }

    #[test]
    fn existing_path_is_not_reinitialized() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let mut s = Session::new();
        let trees = format!("src {}\n", dir.path().display());
        config::load_trees_str(&mut s, &trees, no_vars).unwrap();
        // The command would fail if it ever ran.
        config::load_paths_str(&mut s, "src /data init=missing false\n", no_vars).unwrap();
        run_initializers(&s, OpContext::Mount).unwrap();
    }

    #[test]
    fn always_runs_even_when_present() {
        let (s, dir) = session_with_paths(
            "src /stamp init=always,type=f touch -- \"\\$1\"; echo ran >> log\n",
        );
        run_initializers(&s, OpContext::Mount).unwrap();
        run_initializers(&s, OpContext::Mount).unwrap();
        let log = std::fs::read_to_string(dir.path().join("log")).unwrap();
        assert_eq!(log, "ran\nran\n");
    }

    #[test]
    fn missing_with_skip_errors_at_run_time() {
        // skip passes the loader's existence check but the runner still
        // demands the path at execution time.
        let (s, _dir) = session_with_paths("src /absent init=skip true\n");
        let err = run_initializers(&s, OpContext::Mount).unwrap_err();
        assert!(matches!(err, IlfsError::InitRequiredMissing { .. }));
    }

    #[test]
    fn path_vanishing_under_never_errors_at_run_time() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        let mut s = Session::new();
        let trees = format!("src {}\n", dir.path().display());
        config::load_trees_str(&mut s, &trees, no_vars).unwrap();
        config::load_paths_str(&mut s, "src /data\n", no_vars).unwrap();

        std::fs::remove_dir(dir.path().join("data")).unwrap();
        let err = run_initializers(&s, OpContext::Mount).unwrap_err();
        assert!(matches!(err, IlfsError::InitRequiredMissing { .. }));
    }

    #[test]
    fn blank_command_errors() {
        let (s, _dir) = session_with_paths("src /absent init=missing\n");
        assert!(matches!(
            run_initializers(&s, OpContext::Mount).unwrap_err(),
            IlfsError::InitBlankCommand { .. }
        ));
    }

    #[test]
    fn failing_command_errors() {
        let (s, _dir) = session_with_paths("src /absent init=missing exit 3\n");
        let err = run_initializers(&s, OpContext::Mount).unwrap_err();
        assert!(
            matches!(err, IlfsError::InitFailed { ref detail, .. } if detail.contains("3"))
        );
    }

    #[test]
    fn wrong_result_type_is_a_mismatch() {
        let (s, _dir) = session_with_paths(
            "src /thing init=missing,type=d touch -- \"\\$1\"\n",
        );
        assert!(matches!(
            run_initializers(&s, OpContext::Mount).unwrap_err(),
            IlfsError::InitResultMismatch { .. }
        ));
    }

    #[test]
    fn lying_command_is_a_mismatch() {
        let (s, _dir) = session_with_paths("src /ghost init=missing true\n");
        assert!(matches!(
            run_initializers(&s, OpContext::Mount).unwrap_err(),
            IlfsError::InitResultMismatch { .. }
        ));
    }

    #[test]
    fn contract_environment_is_exported() {
        let (s, dir) = session_with_paths(
            "src /app/data/srcdata init=missing,type=d,rw \
             echo \"\\$ILFS_OP \\$ILFS_TREE \\$ILFS_RELPATH \\$ILFS_EXISTING_RELPATH \
             \\$ILFS_INIT_SUBPATH \\$ILFS_PATH_OPTS_RO \\$ILFS_PATH_OPTS_INIT \
             \\$ILFS_PATH_OPTS_TYPE \\$0 \\$1\" > env.out; mkdir -p -- \"\\$1\"\n",
        );
        std::fs::create_dir_all(dir.path().join("app/data")).unwrap();
        run_initializers(&s, OpContext::Init).unwrap();
        let out = std::fs::read_to_string(dir.path().join("env.out")).unwrap();
        assert_eq!(
            out.trim(),
            "init src app/data/srcdata app/data srcdata 0 missing d init app/data/srcdata"
        );
    }
}
