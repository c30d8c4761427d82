//! Mount orchestration.
//!
//! Runs the full mount sequence over a configured session: initializers
//! first, then placeholder preparation, then one bind per path in
//! registration order. There is no roll-back on partial failure; the
//! explicit unmount operation unwinds whatever was mounted.

use std::path::{Path, PathBuf};

use ilfs_common::{pathutil, IlfsError, IlfsResult};

use crate::init::{self, OpContext};
use crate::mount::planner;
use crate::mount::MountBackend;
use crate::session::{Session, SessionState};

/// Composed path inside the mount target.
fn target_path(target: &Path, composed: &str) -> PathBuf {
    match composed.strip_prefix('/') {
        Some("") | None => target.to_path_buf(),
        Some(rel) => target.join(rel),
    }
}

/// Mount the whole composition onto `target`.
///
/// Requires a path bound to `/`. A failure anywhere moves the session to
/// [`SessionState::Failed`] and aborts; already-issued binds stay in place
/// for the operator to unwind with [`unmount`].
pub fn mount_all(
    session: &mut Session,
    backend: &mut dyn MountBackend,
    target: &Path,
) -> IlfsResult<()> {
    let result = mount_sequence(session, backend, target);
    if result.is_err() {
        session.set_state(SessionState::Failed);
    }
    result
}

fn mount_sequence(
    session: &mut Session,
    backend: &mut dyn MountBackend,
    target: &Path,
) -> IlfsResult<()> {
    if !session.paths.defined("/") {
        return Err(IlfsError::NoRootConfigured);
    }

    init::run_initializers(session, OpContext::Mount)?;
    planner::prepare_mountpoints(session)?;
    session.set_state(SessionState::Planned);

    for entry in session.paths.iter() {
        let tree = session.trees.require(&entry.tree)?;
        let readonly = session.effective_ro(&entry.path)?;
        let source = pathutil::source_path(&tree.root, &entry.path);
        let dest = target_path(target, &entry.path);
        tracing::info!(
            path = %entry.path,
            source = %source.display(),
            readonly,
            "Mounting"
        );
        backend.bind(&source, &dest, readonly)?;
    }

    session.set_state(SessionState::Mounted);
    tracing::info!(count = session.paths.len(), target = %target.display(), "Composition mounted");
    Ok(())
}

/// Recursively lazy-detach the composition at `target`.
pub fn unmount(backend: &mut dyn MountBackend, target: &Path) -> IlfsResult<()> {
    backend.unmount_lazy(target)?;
    tracing::info!(target = %target.display(), "Composition unmounted");
    Ok(())
}
