//! Lazily synchronized, filtered directory tree over a virtual filesystem
//! namespace.

pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod tree;

#[cfg(test)]
mod testing;

pub use error::{Result, TreeError};
pub use tree::{DirectoryTree, NodeId};
