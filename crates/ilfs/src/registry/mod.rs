//! Session registries.
//!
//! This module holds:
//! - The tree registry: named source directories with their options
//! - The path registry: the ordered list of composed paths, which is also
//!   the mount order

mod paths;
mod trees;

pub use paths::{PathRegistry, RegisteredPath};
pub use trees::{Tree, TreeRegistry};
