use serde::Serialize;

use super::directory_tree::DirectoryTree;
use super::node::NodeId;
use crate::fs::HandleKind;

/// Serializable copy of one materialized node and its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub path: String,
    pub label: String,
    pub kind: HandleKind,
    pub expanded: bool,
    pub has_children: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
}

/// Serializable copy of the whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
    pub root: Option<SnapshotNode>,
    pub selected: Option<String>,
}

/// A visible row of the tree in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub id: NodeId,
    pub label: String,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    pub is_selected: bool,
}

impl DirectoryTree {
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            root: self.root.and_then(|root| self.snapshot_node(root)),
            selected: self.current_path().map(str::to_string),
        }
    }

    fn snapshot_node(&self, id: NodeId) -> Option<SnapshotNode> {
        let node = self.node(id)?;
        Some(SnapshotNode {
            id,
            path: node.path().to_string(),
            label: node.label().to_string(),
            kind: node.handle().kind,
            expanded: node.is_expanded(),
            has_children: node.has_children(),
            children: node
                .children()
                .iter()
                .filter_map(|child| self.snapshot_node(*child))
                .collect(),
        })
    }

    /// Rows in display order. Children of collapsed nodes are skipped unless
    /// `include_collapsed`.
    pub fn flatten(&self, include_collapsed: bool) -> Vec<FlatItem> {
        let mut items = Vec::new();
        if let Some(root) = self.root {
            self.flatten_node(root, 0, true, include_collapsed, &mut items);
        }
        items
    }

    fn flatten_node(
        &self,
        id: NodeId,
        depth: usize,
        is_last: bool,
        include_collapsed: bool,
        items: &mut Vec<FlatItem>,
    ) {
        let Some(node) = self.node(id) else {
            return;
        };
        items.push(FlatItem {
            id,
            label: node.label().to_string(),
            depth,
            is_expanded: node.is_expanded(),
            is_last_sibling: is_last,
            is_selected: self.selected == Some(id),
        });

        if node.is_expanded() || include_collapsed {
            let children = node.children();
            for (i, child) in children.iter().enumerate() {
                let is_last_child = i == children.len() - 1;
                self.flatten_node(*child, depth + 1, is_last_child, include_collapsed, items);
            }
        }
    }

    /// Plain text drawing of the visible rows, one per line. The selected row
    /// is marked with `*`.
    pub fn render_text(&self) -> String {
        let items = self.flatten(false);
        let mut out = String::new();
        for (idx, item) in items.iter().enumerate() {
            out.push_str(&build_prefix(item, &items, idx));
            if item.depth > 0 {
                out.push(' ');
            }
            out.push_str(&item.label);
            if item.is_selected {
                out.push_str(" *");
            }
            out.push('\n');
        }
        out
    }
}

/// Box-drawing connectors for a row.
fn build_prefix(item: &FlatItem, items: &[FlatItem], item_index: usize) -> String {
    if item.depth == 0 {
        return String::new();
    }

    let mut parts: Vec<&str> = Vec::new();

    // Each ancestor level draws a rail unless that ancestor was a last sibling.
    for d in 1..item.depth {
        let mut ancestor_is_last = false;
        for j in (0..item_index).rev() {
            if items[j].depth == d {
                ancestor_is_last = items[j].is_last_sibling;
                break;
            }
            if items[j].depth < d {
                break;
            }
        }
        parts.push(if ancestor_is_last { "   " } else { "│  " });
    }

    parts.push(if item.is_last_sibling { "└──" } else { "├──" });
    parts.join("")
}
