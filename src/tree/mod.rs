//! The directory tree: node storage, the reconciler, listing refresh, volume
//! layout and the [`DirectoryTree`] that ties them together.

pub mod directory_tree;
pub mod listing;
pub mod node;
pub mod reconcile;
pub mod snapshot;
pub mod volume;

pub use directory_tree::{
    ApplyOutcome, DirectoryTree, ListingFetcher, RefreshSummary, RefreshTicket,
};
pub use listing::Listing;
pub use node::{NodeId, TreeNode};
pub use reconcile::ReconcileOutcome;
pub use snapshot::{FlatItem, SnapshotNode, TreeSnapshot};
pub use volume::{SearchRoot, VolumeLayout};
