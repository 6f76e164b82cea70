use crate::config::AppConfig;
use crate::fs::path::{self, is_parent_path};
use crate::fs::DirectoryHandle;

/// Virtual search shortcut listed at the remote volume root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot {
    pub path: String,
    pub label: String,
}

/// Splits the virtual namespace into volumes and describes the curated view
/// of the remote volume root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    pub remote_root: String,
    /// Child names of `remote_root` that are never listed.
    pub remote_hidden: Vec<String>,
    /// Child name of `remote_root` relabelled as `my_drive_label`.
    pub my_drive: String,
    pub my_drive_label: String,
    pub search_roots: Vec<SearchRoot>,
    /// Directories whose children are separate volumes.
    pub nested_parents: Vec<String>,
}

impl Default for VolumeLayout {
    fn default() -> Self {
        AppConfig::default().volume_layout()
    }
}

impl VolumeLayout {
    /// Root of the volume `target` lives on.
    ///
    /// Remote paths and virtual search roots all belong to the remote root.
    pub fn volume_root(&self, target: &str) -> String {
        if is_parent_path(&self.remote_root, target)
            || self
                .search_roots
                .iter()
                .any(|root| is_parent_path(&root.path, target))
        {
            return self.remote_root.clone();
        }

        for parent in &self.nested_parents {
            if parent != target && is_parent_path(parent, target) {
                let depth = parent.split('/').filter(|s| !s.is_empty()).count();
                return path::leading_segments(target, depth + 1);
            }
        }

        path::leading_segments(target, 1)
    }

    pub fn is_remote_root(&self, dir: &str) -> bool {
        dir == self.remote_root
    }

    /// Curate a remote root listing: drop reserved directories, relabel the
    /// main drive and append the search shortcuts.
    pub fn curate_remote_listing(&self, entries: Vec<DirectoryHandle>) -> Vec<DirectoryHandle> {
        let mut curated: Vec<DirectoryHandle> = entries
            .into_iter()
            .filter(|handle| !self.remote_hidden.iter().any(|name| *name == handle.name))
            .map(|handle| {
                if handle.name == self.my_drive {
                    handle.with_label(self.my_drive_label.clone())
                } else {
                    handle
                }
            })
            .collect();

        curated.extend(
            self.search_roots
                .iter()
                .map(|root| DirectoryHandle::search_root(root.path.clone(), root.label.clone())),
        );
        curated
    }
}
