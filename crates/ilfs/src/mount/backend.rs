//! Mount backend abstraction.
//!
//! The executor talks to the kernel through [`MountBackend`] so tests can
//! substitute [`RecordingMount`], an in-memory mount table.

use std::path::{Path, PathBuf};

use ilfs_common::{IlfsError, IlfsResult};

/// The mount operations the executor needs.
pub trait MountBackend {
    /// Bind-mount `source` onto `target` with private propagation and the
    /// given read-only policy.
    fn bind(&mut self, source: &Path, target: &Path, readonly: bool) -> IlfsResult<()>;

    /// Recursively lazy-detach everything mounted at or under `target`.
    fn unmount_lazy(&mut self, target: &Path) -> IlfsResult<()>;
}

/// Kernel-backed implementation using `mount(2)` and `umount2(2)`.
#[derive(Debug, Default)]
pub struct LinuxMount;

#[cfg(target_os = "linux")]
impl MountBackend for LinuxMount {
    fn bind(&mut self, source: &Path, target: &Path, readonly: bool) -> IlfsResult<()> {
        use rustix::mount::{
            mount_bind, mount_change, mount_remount, MountFlags, MountPropagationFlags,
        };

        let fail = |e: rustix::io::Errno| IlfsError::MountFailed {
            path: target.display().to_string(),
            detail: e.to_string(),
        };

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            readonly,
            "Creating bind mount"
        );

        mount_bind(source, target).map_err(fail)?;
        mount_change(target, MountPropagationFlags::PRIVATE).map_err(fail)?;
        if readonly {
            mount_remount(target, MountFlags::BIND | MountFlags::RDONLY, "").map_err(fail)?;
        }
        Ok(())
    }

    fn unmount_lazy(&mut self, target: &Path) -> IlfsResult<()> {
        use rustix::mount::{unmount, UnmountFlags};

        tracing::debug!(target = %target.display(), "Lazy unmount");
        unmount(target, UnmountFlags::DETACH).map_err(|e| IlfsError::MountFailed {
            path: target.display().to_string(),
            detail: format!("umount: {e}"),
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl MountBackend for LinuxMount {
    fn bind(&mut self, _source: &Path, _target: &Path, _readonly: bool) -> IlfsResult<()> {
        Err(IlfsError::Platform {
            feature: "bind mounts".to_string(),
        })
    }

    fn unmount_lazy(&mut self, _target: &Path) -> IlfsResult<()> {
        Err(IlfsError::Platform {
            feature: "mount namespaces".to_string(),
        })
    }
}

/// One entry in the recorded mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    /// Bind source.
    pub source: PathBuf,
    /// Bind target.
    pub target: PathBuf,
    /// Whether the mount is read-only.
    pub readonly: bool,
}

/// In-memory mount table for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingMount {
    /// Recorded binds, in issue order.
    pub table: Vec<MountRecord>,
}

impl MountBackend for RecordingMount {
    fn bind(&mut self, source: &Path, target: &Path, readonly: bool) -> IlfsResult<()> {
        self.table.push(MountRecord {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            readonly,
        });
        Ok(())
    }

    fn unmount_lazy(&mut self, target: &Path) -> IlfsResult<()> {
        // A lazy detach takes the whole subtree with it.
        self.table
            .retain(|rec| !(rec.target == target || rec.target.starts_with(target)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_detaches_subtree() {
        let mut rec = RecordingMount::default();
        rec.bind(Path::new("/srv/a"), Path::new("/mnt"), false)
            .unwrap();
        rec.bind(Path::new("/srv/b"), Path::new("/mnt/app"), true)
            .unwrap();
        rec.bind(Path::new("/srv/c"), Path::new("/other"), false)
            .unwrap();
        assert_eq!(rec.table.len(), 3);

        rec.unmount_lazy(Path::new("/mnt")).unwrap();
        assert_eq!(rec.table.len(), 1);
        assert_eq!(rec.table[0].target, PathBuf::from("/other"));
    }
}
