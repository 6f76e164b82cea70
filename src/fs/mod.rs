//! Filesystem collaborator surface: handles, listing entries, the visibility
//! filter, the `FileSystem` trait with its host implementation, and the
//! change watcher.

pub mod filter;
pub mod handle;
pub mod path;
pub mod provider;
pub mod watcher;

pub use filter::FileFilter;
pub use handle::{DirectoryHandle, Entry, HandleKind};
pub use provider::{FileSystem, LocalFs};
