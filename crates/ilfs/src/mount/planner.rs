//! Mountpoint placeholder preparation.
//!
//! Before a path can be bind-mounted, the composed location must exist in
//! the source tree of its parent-in-registry: once the parent is mounted,
//! the placeholder becomes the attachment point. The planner creates the
//! missing placeholders without touching anything that already exists, and
//! marks everything it creates so operators can tell system-owned stubs
//! from real content.

use std::path::{Path, PathBuf};

use ilfs_common::pathutil::{self, PathKind, ProbeError};
use ilfs_common::{IlfsError, IlfsResult};

use crate::registry::RegisteredPath;
use crate::session::Session;

/// Marker file dropped inside every directory the planner creates.
pub const DIR_MARKER: &str = ".ilfs-mountpoint";

/// Exact content of file placeholders.
pub const FILE_MARKER: &str = "#ilfs-mountpoint\n";

/// Scoped umask override, restored on drop.
struct UmaskGuard {
    prev: rustix::fs::Mode,
}

impl UmaskGuard {
    fn new(mask: u32) -> Self {
        Self {
            prev: rustix::process::umask(rustix::fs::Mode::from_bits_truncate(mask)),
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        rustix::process::umask(self.prev);
    }
}

/// Ensure a placeholder exists for every registered path, in order.
pub fn prepare_mountpoints(session: &Session) -> IlfsResult<()> {
    for entry in session.paths.iter() {
        prepare_one(session, entry)?;
    }
    Ok(())
}

fn prepare_one(session: &Session, entry: &RegisteredPath) -> IlfsResult<()> {
    // The root path binds onto the target directory itself.
    if entry.path == "/" {
        return Ok(());
    }

    let tree = session.trees.require(&entry.tree)?;
    let source = pathutil::source_path(&tree.root, &entry.path);
    // The runner has already created missing sources; an absent source
    // here is an invariant violation, not an operator error.
    let kind = pathutil::ospath_type(&source).map_err(|e| IlfsError::Internal {
        message: format!("source for {} not ready: {e}", entry.path),
    })?;

    let Some(parent) = session.paths.parent_in_registry(&entry.path) else {
        return Err(IlfsError::NoRootConfigured);
    };
    let parent_tree = session.trees.require(&parent.tree)?;
    let placeholder = pathutil::source_path(&parent_tree.root, &entry.path);

    match pathutil::ospath_type(&placeholder) {
        Ok(found) if found == kind => Ok(()),
        Ok(found) => Err(IlfsError::MountpointCollision {
            path: placeholder.display().to_string(),
            detail: format!("expected {kind}, found {found}"),
        }),
        Err(ProbeError::NotFound(_)) => {
            create_placeholder(&parent_tree.root, &parent.path, &entry.path, kind)
        }
        Err(ProbeError::Symlink(_)) => Err(IlfsError::MountpointCollision {
            path: placeholder.display().to_string(),
            detail: "symlink in the way".to_string(),
        }),
        Err(ProbeError::Unsupported(_)) => Err(IlfsError::MountpointCollision {
            path: placeholder.display().to_string(),
            detail: "unsupported object in the way".to_string(),
        }),
        Err(ProbeError::Io(e)) => Err(e.into()),
    }
}

/// Create the placeholder for `path` under the parent's source tree,
/// building any missing intermediate directories on the way down.
fn create_placeholder(
    parent_root: &Path,
    parent_path: &str,
    path: &str,
    kind: PathKind,
) -> IlfsResult<()> {
    let rel = if parent_path == "/" {
        &path[1..]
    } else {
        &path[parent_path.len() + 1..]
    };
    let comps: Vec<&str> = rel.split('/').collect();

    let _umask = UmaskGuard::new(0o022);
    let mut cur: PathBuf = pathutil::source_path(parent_root, parent_path);

    for comp in &comps[..comps.len() - 1] {
        cur.push(comp);
        match pathutil::ospath_type(&cur) {
            Ok(PathKind::Dir) => {}
            Ok(PathKind::File) => {
                return Err(IlfsError::MountpointCollision {
                    path: cur.display().to_string(),
                    detail: "file in the way of an intermediate directory".to_string(),
                });
            }
            Err(ProbeError::NotFound(_)) => {
                make_marked_dir(&cur)?;
            }
            Err(ProbeError::Symlink(_) | ProbeError::Unsupported(_)) => {
                return Err(IlfsError::MountpointCollision {
                    path: cur.display().to_string(),
                    detail: "non-directory in the way".to_string(),
                });
            }
            Err(ProbeError::Io(e)) => return Err(e.into()),
        }
    }

    let leaf = cur.join(comps[comps.len() - 1]);
    tracing::debug!(placeholder = %leaf.display(), %kind, "Creating mountpoint placeholder");
    match kind {
        PathKind::Dir => make_marked_dir(&leaf),
        PathKind::File => {
            std::fs::write(&leaf, FILE_MARKER)?;
            Ok(())
        }
    }
}

fn make_marked_dir(dir: &Path) -> IlfsResult<()> {
    std::fs::create_dir(dir)?;
    std::fs::write(dir.join(DIR_MARKER), b"")?;
    Ok(())
}
