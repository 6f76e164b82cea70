use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::fs::DirectoryHandle;

/// Identity of a tree node. Ids are never reused, so an id held across an
/// await point either still names the same node or names nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One directory in the displayed hierarchy.
#[derive(Debug, Clone)]
pub struct TreeNode {
    id: NodeId,
    path: String,
    pub(crate) handle: DirectoryHandle,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) expanded: bool,
    /// Whether the directory has visible sub-directories: set from the last
    /// applied listing, or for a collapsed node from the last sub-directory check.
    pub(crate) has_children: bool,
    /// Bumped every time a refresh of this node is issued.
    pub(crate) generation: u64,
}

impl TreeNode {
    fn new(id: NodeId, handle: DirectoryHandle, parent: Option<NodeId>) -> Self {
        Self {
            id,
            path: handle.path.clone(),
            handle,
            parent,
            children: Vec::new(),
            expanded: false,
            has_children: false,
            generation: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handle(&self) -> &DirectoryHandle {
        &self.handle
    }

    pub fn label(&self) -> &str {
        self.handle.display_label()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }
}

/// Owner of every live node of a tree.
///
/// A node is attached iff it is present here; detaching a node drops its whole
/// subtree.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: HashMap<NodeId, TreeNode>,
    next_id: u64,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node for `handle`. The caller links it into the parent's
    /// child list.
    pub fn insert(&mut self, handle: DirectoryHandle, parent: Option<NodeId>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(id, TreeNode::new(id, handle, parent));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Drop `id` and all its descendants. Returns how many nodes were dropped.
    ///
    /// The parent's child list is not touched.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut removed = 0;
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut arena = NodeArena::new();
        let a = arena.insert(DirectoryHandle::real("/a"), None);
        arena.remove_subtree(a);
        let b = arena.insert(DirectoryHandle::real("/a"), None);
        assert_ne!(a, b);
        assert!(!arena.contains(a));
    }

    #[test]
    fn remove_subtree_drops_descendants() {
        let mut arena = NodeArena::new();
        let root = arena.insert(DirectoryHandle::real("/r"), None);
        let child = arena.insert(DirectoryHandle::real("/r/a"), Some(root));
        let grandchild = arena.insert(DirectoryHandle::real("/r/a/b"), Some(child));
        arena.get_mut(root).unwrap().children.push(child);
        arena.get_mut(child).unwrap().children.push(grandchild);

        assert_eq!(arena.remove_subtree(child), 2);
        assert!(arena.contains(root));
        assert!(!arena.contains(grandchild));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn new_node_starts_collapsed_without_children() {
        let mut arena = NodeArena::new();
        let id = arena.insert(DirectoryHandle::real("/r/Docs"), None);
        let node = arena.get(id).unwrap();
        assert_eq!(node.path(), "/r/Docs");
        assert_eq!(node.label(), "Docs");
        assert!(!node.is_expanded());
        assert!(!node.has_children());
    }
}
