//! Sorted-merge diff between a node's current children and a fresh listing.
//!
//! Both sequences are ordered by [`entry_order`]. A single left-to-right pass
//! keeps every node whose path is still listed, inserts new nodes at their
//! sorted position and drops the rest, so unchanged subtrees keep their
//! identity and expansion state.

use std::cmp::Ordering;

use tracing::debug;

use super::node::{NodeArena, NodeId};
use crate::error::{Result, TreeError};
use crate::fs::DirectoryHandle;

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub retained: usize,
    /// Direct children removed (their subtrees go with them).
    pub removed: usize,
    /// Retained expanded children that a recursive refresh descends into.
    pub cascade: Vec<NodeId>,
}

impl ReconcileOutcome {
    /// True if the child list was left exactly as it was.
    pub fn is_unchanged(&self) -> bool {
        self.inserted == 0 && self.removed == 0
    }
}

/// Case-insensitive name, then case-sensitive path. Listings are sorted with
/// this and the merge compares with it, so both sides always agree.
pub fn entry_order(a: &DirectoryHandle, b: &DirectoryHandle) -> Ordering {
    if a.path == b.path {
        return Ordering::Equal;
    }
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.path.cmp(&b.path))
}

/// Converge the children of `parent` to `incoming`.
///
/// `incoming` must already be sorted by [`entry_order`] and hold unique paths.
/// When the result is empty the node is collapsed, unless `keep_expanded`
/// (the tree root is always expanded).
pub fn reconcile(
    arena: &mut NodeArena,
    parent: NodeId,
    incoming: Vec<DirectoryHandle>,
    recursive: bool,
    keep_expanded: bool,
) -> Result<ReconcileOutcome> {
    let mut children = match arena.get_mut(parent) {
        Some(node) => std::mem::take(&mut node.children),
        None => return Err(TreeError::Detached(parent)),
    };
    let mut outcome = ReconcileOutcome::default();
    let mut incoming = incoming.into_iter().peekable();
    let mut index = 0;

    while let Some(entry) = incoming.peek() {
        let Some(current_id) = children.get(index).copied() else {
            if let Some(entry) = incoming.next() {
                children.push(arena.insert(entry, Some(parent)));
                outcome.inserted += 1;
                index += 1;
            }
            continue;
        };

        let order = match arena.get(current_id) {
            Some(current) => entry_order(entry, &current.handle),
            // Already gone; treat as removed.
            None => Ordering::Greater,
        };

        match order {
            Ordering::Equal => {
                if let (Some(entry), Some(current)) = (incoming.next(), arena.get_mut(current_id)) {
                    current.handle = entry;
                    if recursive && current.expanded {
                        outcome.cascade.push(current_id);
                    }
                }
                outcome.retained += 1;
                index += 1;
            }
            Ordering::Less => {
                if let Some(entry) = incoming.next() {
                    children.insert(index, arena.insert(entry, Some(parent)));
                    outcome.inserted += 1;
                    index += 1;
                }
            }
            Ordering::Greater => {
                let stale = children.remove(index);
                arena.remove_subtree(stale);
                outcome.removed += 1;
            }
        }
    }

    for stale in children.drain(index..) {
        arena.remove_subtree(stale);
        outcome.removed += 1;
    }

    let node = arena
        .get_mut(parent)
        .ok_or(TreeError::Detached(parent))?;
    node.has_children = !children.is_empty();
    if children.is_empty() && !keep_expanded {
        node.expanded = false;
    }
    node.children = children;

    debug!(
        parent = %node.path(),
        inserted = outcome.inserted,
        retained = outcome.retained,
        removed = outcome.removed,
        "reconciled children"
    );
    Ok(outcome)
}
