//! # ilfs
//!
//! Compose a Linux directory tree from a set of source directory trees by
//! issuing a coordinated sequence of bind mounts onto a single target
//! directory. Each composed path is routed to exactly one source tree and
//! written through to it; there is no layering or copy-up.
//!
//! The engine is driven by two declarative tables (trees and paths), loaded
//! by [`config`], held in a [`session::Session`], and executed by
//! [`mount::executor`] after [`init`] has created any missing source
//! objects and [`mount::planner`] has prepared mountpoint placeholders.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod init;
pub mod mount;
pub mod options;
pub mod registry;
pub mod session;

pub use session::{Session, SessionState};
