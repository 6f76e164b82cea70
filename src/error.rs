use thiserror::Error;

use crate::tree::NodeId;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors surfaced by tree operations.
///
/// None of these are fatal: callers decide the fallback (keep the old
/// children, select nothing, show an error state).
#[derive(Debug, Error)]
pub enum TreeError {
    /// Enumerating or resolving a directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A placeholder handle resolved to another placeholder.
    #[error("Placeholder never resolved: {0}")]
    UnresolvedPlaceholder(String),

    /// Selection target does not exist in the tree.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The node was removed from the tree before the operation ran.
    #[error("Node {0} is no longer attached to the tree")]
    Detached(NodeId),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Filesystem watcher setup failed.
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Writing a JSON snapshot failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<notify::Error> for TreeError {
    fn from(err: notify::Error) -> Self {
        TreeError::Watcher(err.to_string())
    }
}
