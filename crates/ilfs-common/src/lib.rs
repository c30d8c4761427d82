//! # ilfs-common
//!
//! Shared utilities and types for the ilfs mount composer.
//!
//! This crate provides the functionality used across the ilfs crates:
//! - Common error types and exit-code mapping
//! - POSIX-style path helpers, glob classification and expansion
//! - The `${NAME}` template substitutor used on configuration streams

#![warn(missing_docs)]

pub mod error;
pub mod pathutil;
pub mod template;

pub use error::{IlfsError, IlfsResult};
pub use pathutil::PathKind;
