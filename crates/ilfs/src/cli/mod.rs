//! CLI command definitions and handlers.

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use ilfs_common::pathutil::{self, PathKind};
use ilfs_common::{IlfsError, IlfsResult};

use crate::config;
use crate::init::{self, OpContext};
use crate::mount::{executor, LinuxMount};
use crate::session::{Session, SessionState};

/// ilfs - compose a directory tree from source trees with bind mounts
#[derive(Debug, Parser)]
#[command(name = "ilfs", version, about)]
pub struct Cli {
    /// Mount the whole composition read-only (same as -o ro)
    #[arg(short = 'r')]
    pub readonly: bool,

    /// Run initializers only; do not mount
    #[arg(short = 'i', conflicts_with = "unmount")]
    pub init_only: bool,

    /// Unmount TARGET (recursive lazy detach) instead of mounting
    #[arg(short = 'u')]
    pub unmount: bool,

    /// Global options, comma-separated name[=value]; may repeat
    #[arg(short = 'o', value_name = "OPTSTR")]
    pub options: Vec<String>,

    /// Trees table: NAME ROOT [OPTS] per line
    #[arg(long, value_name = "PATH", required_unless_present = "unmount")]
    pub treefile: Option<PathBuf>,

    /// Paths table: TREE PATHSPEC [OPTS [INITCMD...]] per line
    #[arg(long, value_name = "PATH", required_unless_present = "unmount")]
    pub pathfile: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Mount target directory
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,
}

/// Probe for the capabilities the executor needs on this host.
fn platform_check() -> IlfsResult<()> {
    if cfg!(target_os = "linux") {
        Ok(())
    } else {
        Err(IlfsError::Platform {
            feature: "Linux bind mounts".to_string(),
        })
    }
}

fn open_table(path: &PathBuf) -> IlfsResult<File> {
    File::open(path).map_err(|e| IlfsError::Usage {
        message: format!("cannot open {}: {e}", path.display()),
    })
}

impl Cli {
    /// Execute the parsed command.
    pub fn execute(self) -> IlfsResult<()> {
        platform_check()?;

        if self.unmount {
            return executor::unmount(&mut LinuxMount, &self.target);
        }

        match pathutil::ospath_type(&self.target) {
            Ok(PathKind::Dir) => {}
            _ => {
                return Err(IlfsError::Usage {
                    message: format!(
                        "target {} is not an existing directory",
                        self.target.display()
                    ),
                });
            }
        }

        let mut session = Session::new();
        for optstr in &self.options {
            session.push_global_opts(optstr)?;
        }
        if self.readonly {
            session.push_global_opts("ro")?;
        }

        let (Some(treefile), Some(pathfile)) = (&self.treefile, &self.pathfile) else {
            // clap's required_unless_present already enforces this.
            return Err(IlfsError::Internal {
                message: "table files missing after argument parsing".to_string(),
            });
        };
        config::load_trees(&mut session, &mut open_table(treefile)?)?;
        config::load_paths(&mut session, &mut open_table(pathfile)?)?;
        session.set_state(SessionState::Configured);

        if self.init_only {
            return init::run_initializers(&session, OpContext::Init);
        }
        executor::mount_all(&mut session, &mut LinuxMount, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mount_invocation() {
        let cli = Cli::parse_from([
            "ilfs",
            "-r",
            "-o",
            "init=never",
            "-o",
            "type=e",
            "--treefile",
            "trees.tab",
            "--pathfile",
            "paths.tab",
            "/mnt/compose",
        ]);
        assert!(cli.readonly);
        assert!(!cli.unmount);
        assert_eq!(cli.options, ["init=never", "type=e"]);
        assert_eq!(cli.target, PathBuf::from("/mnt/compose"));
    }

    #[test]
    fn parses_unmount_invocation() {
        let cli = Cli::parse_from(["ilfs", "-u", "/mnt/compose"]);
        assert!(cli.unmount);
        assert!(cli.treefile.is_none());
    }

    #[test]
    fn mount_requires_both_tables() {
        assert!(Cli::try_parse_from(["ilfs", "/mnt/compose"]).is_err());
        assert!(Cli::try_parse_from([
            "ilfs",
            "--treefile",
            "trees.tab",
            "/mnt/compose"
        ])
        .is_err());
    }

    #[test]
    fn init_only_conflicts_with_unmount() {
        assert!(Cli::try_parse_from(["ilfs", "-i", "-u", "/mnt/compose"]).is_err());
    }
}
