//! End-to-end composition flow against the recording mount backend.

use std::path::PathBuf;

use tempfile::tempdir;

use ilfs::config;
use ilfs::mount::executor;
use ilfs::mount::planner::DIR_MARKER;
use ilfs::mount::RecordingMount;
use ilfs::session::{Session, SessionState};

fn no_vars(_: &str) -> Option<String> {
    None
}

#[test]
fn full_mount_and_unmount_cycle() {
    let src = tempdir().unwrap();
    let data1 = tempdir().unwrap();
    let data2 = tempdir().unwrap();
    let target = tempdir().unwrap();

    std::fs::create_dir_all(src.path().join("etc")).unwrap();
    std::fs::write(src.path().join("etc/app.conf"), b"key=1\n").unwrap();
    std::fs::create_dir_all(data1.path().join("app/data")).unwrap();
    std::fs::create_dir_all(data2.path().join("app/logs")).unwrap();

    let mut session = Session::new();
    let trees = format!(
        "src {}\ndata1 {}\ndata2 {}\n",
        src.path().display(),
        data1.path().display(),
        data2.path().display()
    );
    config::load_trees_str(&mut session, &trees, no_vars).unwrap();

    let paths = "\
# composed view
src /
data1 /app/data rw
data2 /app/logs rw
src /etc/app.conf ro
data1 /work/cache init=missing,type=d mkdir -p -- \"\\$1\"
";
    config::load_paths_str(&mut session, paths, no_vars).unwrap();
    session.set_state(SessionState::Configured);
    assert_eq!(session.paths.len(), 5);

    let mut backend = RecordingMount::default();
    executor::mount_all(&mut session, &mut backend, target.path()).unwrap();
    assert_eq!(session.state(), SessionState::Mounted);

    // One bind per registered path, in registration order.
    assert_eq!(backend.table.len(), 5);
    let targets: Vec<PathBuf> = backend.table.iter().map(|r| r.target.clone()).collect();
    assert_eq!(
        targets,
        [
            target.path().to_path_buf(),
            target.path().join("app/data"),
            target.path().join("app/logs"),
            target.path().join("etc/app.conf"),
            target.path().join("work/cache"),
        ]
    );
    assert!(backend.table[3].readonly);
    assert!(!backend.table[1].readonly);

    // The initializer created the missing source directory.
    assert!(data1.path().join("work/cache").is_dir());

    // Placeholders landed on the root tree, marked as system-owned.
    assert!(src.path().join("app/data").join(DIR_MARKER).is_file());
    assert!(src.path().join("app/logs").join(DIR_MARKER).is_file());
    assert!(src.path().join("work/cache").join(DIR_MARKER).is_file());

    // Unmount drains the whole table in one operation.
    executor::unmount(&mut backend, target.path()).unwrap();
    assert!(backend.table.is_empty());
}

#[test]
fn global_readonly_forces_every_mount() {
    let src = tempdir().unwrap();
    let data = tempdir().unwrap();
    let target = tempdir().unwrap();
    std::fs::create_dir_all(data.path().join("app")).unwrap();

    let mut session = Session::new();
    let trees = format!("src {}\ndata1 {}\n", src.path().display(), data.path().display());
    config::load_trees_str(&mut session, &trees, no_vars).unwrap();
    config::load_paths_str(&mut session, "src / rw\ndata1 /app rw\n", no_vars).unwrap();
    session.push_global_opts("ro").unwrap();

    let mut backend = RecordingMount::default();
    executor::mount_all(&mut session, &mut backend, target.path()).unwrap();
    assert!(backend.table.iter().all(|rec| rec.readonly));
}

#[test]
fn treefile_roots_substitute_environment_variables() {
    let src = tempdir().unwrap();
    let root = src.path().to_str().unwrap().to_string();

    let mut session = Session::new();
    config::load_trees_str(&mut session, "src ${COMPOSE_ROOT}\n", |name| {
        (name == "COMPOSE_ROOT").then(|| root.clone())
    })
    .unwrap();
    config::load_paths_str(&mut session, "src /\n", no_vars).unwrap();

    let target = tempdir().unwrap();
    let mut backend = RecordingMount::default();
    executor::mount_all(&mut session, &mut backend, target.path()).unwrap();
    assert_eq!(
        backend.table[0].source,
        std::fs::canonicalize(src.path()).unwrap()
    );
}

#[test]
fn glob_entries_mount_individually() {
    let src = tempdir().unwrap();
    let conf = tempdir().unwrap();
    let target = tempdir().unwrap();
    std::fs::create_dir(conf.path().join("conf.d")).unwrap();
    std::fs::write(conf.path().join("conf.d/10-base.conf"), b"").unwrap();
    std::fs::write(conf.path().join("conf.d/20-site.conf"), b"").unwrap();

    let mut session = Session::new();
    let trees = format!("src {}\nconf {}\n", src.path().display(), conf.path().display());
    config::load_trees_str(&mut session, &trees, no_vars).unwrap();
    config::load_paths_str(&mut session, "src /\nconf /conf.d/*.conf\n", no_vars).unwrap();

    let mut backend = RecordingMount::default();
    executor::mount_all(&mut session, &mut backend, target.path()).unwrap();

    assert_eq!(backend.table.len(), 3);
    assert_eq!(backend.table[1].target, target.path().join("conf.d/10-base.conf"));
    assert_eq!(backend.table[2].target, target.path().join("conf.d/20-site.conf"));

    // File placeholders carry the marker line on the parent tree.
    let stub = std::fs::read_to_string(src.path().join("conf.d/10-base.conf")).unwrap();
    assert_eq!(stub, "#ilfs-mountpoint\n");
}

#[test]
fn mount_failure_leaves_session_failed() {
    let src = tempdir().unwrap();
    let target = tempdir().unwrap();

    let mut session = Session::new();
    let trees = format!("src {}\n", src.path().display());
    config::load_trees_str(&mut session, &trees, no_vars).unwrap();
    // No path bound to / at all.
    config::load_paths_str(&mut session, "", no_vars).unwrap();

    let mut backend = RecordingMount::default();
    assert!(executor::mount_all(&mut session, &mut backend, target.path()).is_err());
    assert_eq!(session.state(), SessionState::Failed);
}
