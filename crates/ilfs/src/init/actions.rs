//! Built-in initializer actions.
//!
//! The canonical actions embedders can use instead of ad-hoc shell:
//! create the missing subpath, render a template through the substitutor,
//! or copy a seed tree into place. Every creating action honors the
//! operator-environment ownership conventions `ILFS_INIT_CHOWN` and
//! `ILFS_INIT_CHGRP`, applied to the freshly created subpaths only.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use ilfs_common::template;
use ilfs_common::{IlfsError, IlfsResult};

/// The initializer contract environment an action operates under.
///
/// Mirrors the `ILFS_*` variables the runner exports; embedders can build
/// one directly or read it back from the process environment inside an
/// initializer subprocess.
#[derive(Debug, Clone)]
pub struct ActionEnv {
    /// Source tree root (`ILFS_TREE_ROOT`).
    pub tree_root: PathBuf,
    /// Path relative to the tree root, `.` for the root (`ILFS_RELPATH`).
    pub relpath: String,
    /// Longest leading prefix of `relpath` that already exists as a
    /// directory (`ILFS_EXISTING_RELPATH`), `.` when none does.
    pub existing_relpath: String,
    /// Remainder the initializer is responsible for creating
    /// (`ILFS_INIT_SUBPATH`).
    pub init_subpath: String,
}

impl ActionEnv {
    /// Read the contract environment of the current process.
    pub fn from_env() -> IlfsResult<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| IlfsError::Internal {
                message: format!("{name} not set in initializer environment"),
            })
        };
        Ok(Self {
            tree_root: PathBuf::from(var("ILFS_TREE_ROOT")?),
            relpath: var("ILFS_RELPATH")?,
            existing_relpath: var("ILFS_EXISTING_RELPATH")?,
            init_subpath: var("ILFS_INIT_SUBPATH")?,
        })
    }

    /// Absolute destination of the path being initialized.
    #[must_use]
    pub fn dest(&self) -> PathBuf {
        if self.relpath == "." {
            self.tree_root.clone()
        } else {
            self.tree_root.join(&self.relpath)
        }
    }

    /// Topmost path component this initializer creates, if any.
    ///
    /// Ownership adjustment starts here: everything above already existed.
    #[must_use]
    pub fn created_base(&self) -> Option<PathBuf> {
        let first = self.init_subpath.split('/').next()?;
        if first.is_empty() {
            return None;
        }
        let base = if self.existing_relpath == "." {
            self.tree_root.join(first)
        } else {
            self.tree_root.join(&self.existing_relpath).join(first)
        };
        Some(base)
    }
}

/// Create the missing subpath as a directory chain.
pub fn mkdir(env: &ActionEnv) -> IlfsResult<()> {
    fs::create_dir_all(env.dest())?;
    adjust_ownership(env)
}

/// Render `tpl` through the template substitutor (variables from the
/// process environment) and write the result to the destination file.
pub fn template_envsubst(env: &ActionEnv, tpl: &Path) -> IlfsResult<()> {
    let input = fs::read_to_string(tpl)?;
    let rendered = template::substitute_env(&input).map_err(IlfsError::from)?;
    let dest = env.dest();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&dest, rendered)?;
    adjust_ownership(env)
}

/// Recursively copy `src` to the destination, preserving permissions and
/// timestamps. Refuses to overwrite an existing destination.
pub fn copy(env: &ActionEnv, src: &Path) -> IlfsResult<()> {
    let dest = env.dest();
    if dest.symlink_metadata().is_ok() {
        return Err(IlfsError::InitFailed {
            path: env.relpath.clone(),
            detail: format!("destination exists: {}", dest.display()),
        });
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_recursive(src, &dest)?;
    adjust_ownership(env)
}

fn copy_recursive(src: &Path, dest: &Path) -> IlfsResult<()> {
    let meta = fs::symlink_metadata(src)?;
    if !meta.is_dir() {
        copy_entry(src, dest, &meta)?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| IlfsError::InitFailed {
            path: src.display().to_string(),
            detail: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| IlfsError::Internal {
                message: format!("walk escaped {}: {e}", src.display()),
            })?;
        let target = if rel.as_os_str().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(rel)
        };
        let meta = entry.path().symlink_metadata()?;
        copy_entry(entry.path(), &target, &meta)?;
    }
    Ok(())
}

fn copy_entry(src: &Path, dest: &Path, meta: &fs::Metadata) -> IlfsResult<()> {
    let ft = meta.file_type();
    if ft.is_dir() {
        fs::create_dir(dest)?;
        fs::set_permissions(dest, meta.permissions())?;
    } else if ft.is_symlink() {
        let link = fs::read_link(src)?;
        std::os::unix::fs::symlink(link, dest)?;
        return Ok(()); // symlinks carry no times or modes of their own
    } else {
        fs::copy(src, dest)?;
    }
    copy_times(dest, meta)
}

fn copy_times(dest: &Path, meta: &fs::Metadata) -> IlfsResult<()> {
    let mut times = fs::FileTimes::new();
    if let Ok(t) = meta.modified() {
        times = times.set_modified(t);
    }
    if let Ok(t) = meta.accessed() {
        times = times.set_accessed(t);
    }
    fs::File::options()
        .read(true)
        .open(dest)?
        .set_times(times)?;
    Ok(())
}

/// Apply `ILFS_INIT_CHOWN` / `ILFS_INIT_CHGRP` (numeric ids) to the
/// freshly created subpaths. A no-op when neither variable is set or
/// nothing was created.
pub fn adjust_ownership(env: &ActionEnv) -> IlfsResult<()> {
    let uid = parse_id("ILFS_INIT_CHOWN", env)?;
    let gid = parse_id("ILFS_INIT_CHGRP", env)?;
    if uid.is_none() && gid.is_none() {
        return Ok(());
    }
    let Some(base) = env.created_base() else {
        return Ok(());
    };

    for entry in WalkDir::new(&base).follow_links(false) {
        let entry = entry.map_err(|e| IlfsError::InitFailed {
            path: env.relpath.clone(),
            detail: e.to_string(),
        })?;
        std::os::unix::fs::lchown(entry.path(), uid, gid)?;
    }
    Ok(())
}

fn parse_id(name: &str, env: &ActionEnv) -> IlfsResult<Option<u32>> {
    match std::env::var(name) {
        Err(_) => Ok(None),
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| IlfsError::InitFailed {
                path: env.relpath.clone(),
                detail: format!("{name} expects a numeric id, got {value:?}"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env_for(root: &Path, relpath: &str, existing: &str, subpath: &str) -> ActionEnv {
        ActionEnv {
            tree_root: root.to_path_buf(),
            relpath: relpath.to_string(),
            existing_relpath: existing.to_string(),
            init_subpath: subpath.to_string(),
        }
    }

    #[test]
    fn mkdir_creates_the_subpath() {
        let dir = tempdir().unwrap();
        let env = env_for(dir.path(), "a/b/c", ".", "a/b/c");
        mkdir(&env).unwrap();
        assert!(dir.path().join("a/b/c").is_dir());
    }

    #[test]
    fn template_renders_from_environment() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.tpl"),
            "NAME1=${ILFS_TEST_VALUE1}\nNAME2=${ILFS_TEST_VALUE2}",
        )
        .unwrap();
        std::env::set_var("ILFS_TEST_VALUE1", "foo");
        std::env::set_var("ILFS_TEST_VALUE2", "bar");

        let env = env_for(dir.path(), "etc/app.conf", ".", "etc/app.conf");
        template_envsubst(&env, &dir.path().join("app.tpl")).unwrap();

        let out = std::fs::read_to_string(dir.path().join("etc/app.conf")).unwrap();
        assert_eq!(out, "NAME1=foo\nNAME2=bar\n");
    }

    #[test]
    fn copy_refuses_existing_destination() {
        let dir = tempdir().unwrap();
        let seed = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();

        let env = env_for(dir.path(), "data", ".", "data");
        let err = copy(&env, seed.path()).unwrap_err();
        assert!(matches!(err, IlfsError::InitFailed { .. }));
    }

    #[test]
    fn copy_recreates_tree_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let seed = tempdir().unwrap();
        std::fs::create_dir(seed.path().join("sub")).unwrap();
        std::fs::write(seed.path().join("sub/file"), b"payload").unwrap();
        std::fs::set_permissions(
            seed.path().join("sub/file"),
            std::fs::Permissions::from_mode(0o640),
        )
        .unwrap();
        std::os::unix::fs::symlink("sub/file", seed.path().join("link")).unwrap();

        let dir = tempdir().unwrap();
        let env = env_for(dir.path(), "data", ".", "data");
        copy(&env, seed.path()).unwrap();

        let dest = dir.path().join("data");
        assert_eq!(std::fs::read(dest.join("sub/file")).unwrap(), b"payload");
        let mode = std::fs::metadata(dest.join("sub/file"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
        assert_eq!(
            std::fs::read_link(dest.join("link")).unwrap(),
            PathBuf::from("sub/file")
        );
    }

    #[test]
    fn created_base_points_at_first_new_component() {
        let dir = tempdir().unwrap();
        let env = env_for(dir.path(), "app/data/srcdata", "app/data", "srcdata");
        assert_eq!(
            env.created_base().unwrap(),
            dir.path().join("app/data/srcdata")
        );

        let env = env_for(dir.path(), "fresh/sub", ".", "fresh/sub");
        assert_eq!(env.created_base().unwrap(), dir.path().join("fresh"));

        let env = env_for(dir.path(), "app", "app", "");
        assert!(env.created_base().is_none());
    }
}
