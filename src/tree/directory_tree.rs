use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::listing::{fetch_listing, check_has_children, Listing};
use super::node::{NodeArena, NodeId, TreeNode};
use super::reconcile::{reconcile, ReconcileOutcome};
use super::volume::VolumeLayout;
use crate::config::AppConfig;
use crate::error::{Result, TreeError};
use crate::fs::path::{self, is_parent_path};
use crate::fs::watcher::ChangeSet;
use crate::fs::{DirectoryHandle, FileFilter, FileSystem};

/// An issued refresh of one node, waiting for its listing.
///
/// Only the most recently issued ticket of a node may be applied; older ones
/// are discarded as stale.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    node: NodeId,
    generation: u64,
    handle: DirectoryHandle,
    recursive: bool,
}

impl RefreshTicket {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn handle(&self) -> &DirectoryHandle {
        &self.handle
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }
}

/// Result of applying a fetched listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(ReconcileOutcome),
    /// The node was detached or refreshed again since the ticket was issued.
    Stale,
}

/// Totals of one [`DirectoryTree::reconcile`] call, cascade included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Nodes whose listing was applied.
    pub nodes: usize,
    pub inserted: usize,
    pub removed: usize,
    /// Cascaded descendants whose refresh failed and were left untouched.
    pub failed: usize,
    /// The requested node's own listing was dropped as stale.
    pub stale: bool,
    /// Collapsed children checked for sub-directories.
    pub checked: usize,
}

impl RefreshSummary {
    fn add(&mut self, outcome: &ReconcileOutcome) {
        self.nodes += 1;
        self.inserted += outcome.inserted;
        self.removed += outcome.removed;
    }
}

/// Everything a listing fetch needs, detached from the tree so fetches can
/// run while the tree is used elsewhere.
#[derive(Clone)]
pub struct ListingFetcher {
    fs: Arc<dyn FileSystem>,
    filter: FileFilter,
    layout: VolumeLayout,
}

impl ListingFetcher {
    pub async fn fetch(&self, ticket: &RefreshTicket) -> Result<Listing> {
        fetch_listing(self.fs.as_ref(), &self.filter, &self.layout, &ticket.handle).await
    }

    /// Whether `handle` has visible children, without listing them.
    pub async fn has_children(&self, handle: &DirectoryHandle) -> Result<bool> {
        check_has_children(self.fs.as_ref(), &self.filter, &self.layout, handle).await
    }
}

/// Lazily synchronized, filtered and sorted view over a directory hierarchy.
///
/// The tree tracks one volume root at a time. Children are only fetched for
/// the root, for expanded nodes and along a selection path.
pub struct DirectoryTree {
    fs: Arc<dyn FileSystem>,
    filter: FileFilter,
    layout: VolumeLayout,
    pub(crate) arena: NodeArena,
    pub(crate) root: Option<NodeId>,
    pub(crate) selected: Option<NodeId>,
}

impl DirectoryTree {
    pub fn new(fs: Arc<dyn FileSystem>, filter: FileFilter, layout: VolumeLayout) -> Self {
        Self {
            fs,
            filter,
            layout,
            arena: NodeArena::new(),
            root: None,
            selected: None,
        }
    }

    /// Tree using the filter and volume layout described by `config`.
    pub fn from_config(fs: Arc<dyn FileSystem>, config: &AppConfig) -> Self {
        Self::new(fs, config.file_filter(), config.volume_layout())
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root_path(&self) -> Option<&str> {
        self.root.and_then(|id| self.arena.get(id)).map(TreeNode::path)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.arena.get(id)
    }

    /// Children of `id`, empty if the node is gone.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.arena.get(id).map(TreeNode::children).unwrap_or(&[])
    }

    /// Materialized node at `target`, without fetching anything.
    pub fn find_by_path(&self, target: &str) -> Option<NodeId> {
        let target = path::normalize(target);
        let mut current = self.root?;
        loop {
            let node = self.arena.get(current)?;
            if node.path() == target {
                return Some(current);
            }
            current = self.child_towards(current, &target)?;
        }
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Path of the selected node.
    pub fn current_path(&self) -> Option<&str> {
        self.selected
            .and_then(|id| self.arena.get(id))
            .map(TreeNode::path)
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    fn child_towards(&self, parent: NodeId, target: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|child| {
            self.arena
                .get(*child)
                .is_some_and(|node| is_parent_path(node.path(), target))
        })
    }

    // ── Refresh phases ──────────────────────────────────────────────────────

    /// Issue a refresh of `id`, superseding any refresh still in flight.
    pub fn begin_refresh(&mut self, id: NodeId, recursive: bool) -> Result<RefreshTicket> {
        let node = self.arena.get_mut(id).ok_or(TreeError::Detached(id))?;
        node.generation += 1;
        debug!(node = %id, path = %node.path(), recursive, "refresh issued");
        Ok(RefreshTicket {
            node: id,
            generation: node.generation,
            handle: node.handle.clone(),
            recursive,
        })
    }

    /// Snapshot of the collaborator, filter and layout for fetching listings.
    pub fn fetcher(&self) -> ListingFetcher {
        ListingFetcher {
            fs: self.fs.clone(),
            filter: self.filter.clone(),
            layout: self.layout.clone(),
        }
    }

    /// Apply a fetched listing to the ticket's node.
    ///
    /// Tickets for detached nodes or superseded refreshes are dropped
    /// silently, whether their fetch succeeded or not. A failed fetch leaves
    /// the node's children untouched.
    pub fn apply_listing(
        &mut self,
        ticket: RefreshTicket,
        listing: Result<Listing>,
    ) -> Result<ApplyOutcome> {
        let Some(node) = self.arena.get_mut(ticket.node) else {
            debug!(node = %ticket.node, "dropping listing for detached node");
            return Ok(ApplyOutcome::Stale);
        };
        if node.generation != ticket.generation {
            debug!(
                node = %ticket.node,
                issued = ticket.generation,
                latest = node.generation,
                "dropping superseded listing"
            );
            return Ok(ApplyOutcome::Stale);
        }

        let listing = listing?;
        if let Some(resolved) = listing.resolved {
            node.handle = resolved;
        }

        let keep_expanded = self.root == Some(ticket.node);
        let outcome = reconcile(
            &mut self.arena,
            ticket.node,
            listing.entries,
            ticket.recursive,
            keep_expanded,
        )?;

        if self.selected.is_some_and(|id| !self.arena.contains(id)) {
            self.selected = None;
        }
        Ok(ApplyOutcome::Applied(outcome))
    }

    // ── Operations ──────────────────────────────────────────────────────────

    /// Refresh `id` from the filesystem and reconcile its children.
    ///
    /// With `recursive`, retained expanded children are refreshed too, breadth
    /// first. Failures below `id` are logged and leave those nodes as they
    /// were; a failure of `id` itself is returned. Collapsed children of every
    /// expanded node refreshed here are checked for sub-directories so their
    /// `has_children` is accurate before they are ever listed.
    pub async fn reconcile(&mut self, id: NodeId, recursive: bool) -> Result<RefreshSummary> {
        self.refresh(id, recursive, false).await
    }

    async fn refresh(
        &mut self,
        id: NodeId,
        recursive: bool,
        check_always: bool,
    ) -> Result<RefreshSummary> {
        let fetcher = self.fetcher();
        let mut summary = RefreshSummary::default();

        let ticket = self.begin_refresh(id, recursive)?;
        let listing = fetcher.fetch(&ticket).await;
        let mut queue: VecDeque<NodeId> = match self.apply_listing(ticket, listing)? {
            ApplyOutcome::Applied(outcome) => {
                summary.add(&outcome);
                outcome.cascade.into_iter().collect()
            }
            ApplyOutcome::Stale => {
                summary.stale = true;
                return Ok(summary);
            }
        };
        if check_always || self.node(id).is_some_and(TreeNode::is_expanded) {
            summary.checked += self.check_children(&fetcher, id).await;
        }

        while let Some(child) = queue.pop_front() {
            let Ok(ticket) = self.begin_refresh(child, true) else {
                continue;
            };
            let listing = fetcher.fetch(&ticket).await;
            let path = ticket.handle.path.clone();
            match self.apply_listing(ticket, listing) {
                Ok(ApplyOutcome::Applied(outcome)) => {
                    summary.add(&outcome);
                    queue.extend(outcome.cascade);
                    if self.node(child).is_some_and(TreeNode::is_expanded) {
                        summary.checked += self.check_children(&fetcher, child).await;
                    }
                }
                Ok(ApplyOutcome::Stale) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!(%path, error = %e, "refresh of descendant failed, keeping its children");
                }
            }
        }

        Ok(summary)
    }

    /// Set `has_children` on each collapsed child of `parent` from a
    /// sub-directory check. Grandchildren are not materialized. Returns how
    /// many children were checked.
    async fn check_children(&mut self, fetcher: &ListingFetcher, parent: NodeId) -> usize {
        let targets: Vec<(NodeId, DirectoryHandle)> = self
            .children(parent)
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .filter(|node| !node.is_expanded())
            .map(|node| (node.id(), node.handle().clone()))
            .collect();

        for (id, handle) in &targets {
            match fetcher.has_children(handle).await {
                Ok(has_children) => {
                    if let Some(node) = self.arena.get_mut(*id) {
                        if !node.expanded {
                            node.has_children = has_children;
                        }
                    }
                }
                Err(e) => debug!(path = %handle.path, error = %e, "sub-directory check failed"),
            }
        }
        targets.len()
    }

    /// Expand `id` and refresh its subtree. On failure the node collapses
    /// again.
    pub async fn expand(&mut self, id: NodeId) -> Result<RefreshSummary> {
        let node = self.arena.get_mut(id).ok_or(TreeError::Detached(id))?;
        node.expanded = true;
        match self.reconcile(id, true).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                if self.root != Some(id) {
                    if let Some(node) = self.arena.get_mut(id) {
                        node.expanded = false;
                    }
                }
                Err(e)
            }
        }
    }

    /// Collapse `id`. Its materialized children stay in place; the tree root
    /// cannot be collapsed.
    pub fn collapse(&mut self, id: NodeId) -> Result<()> {
        if self.root == Some(id) {
            return Ok(());
        }
        let node = self.arena.get_mut(id).ok_or(TreeError::Detached(id))?;
        node.expanded = false;
        Ok(())
    }

    /// Replace the active filter and refresh the whole tree.
    pub async fn set_filter(&mut self, filter: FileFilter) -> Result<RefreshSummary> {
        if filter == self.filter {
            return Ok(RefreshSummary::default());
        }
        self.filter = filter;
        match self.root {
            Some(root) => self.reconcile(root, true).await,
            None => Ok(RefreshSummary::default()),
        }
    }

    /// Drop every node and forget the root.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
        self.selected = None;
    }

    /// Rebind the tree to the volume rooted at `volume_root`, discarding all
    /// nodes of the previous root. The new root is resolved on first refresh.
    fn bind_root(&mut self, volume_root: &str) -> NodeId {
        info!(root = volume_root, "binding tree root");
        self.clear();
        let root = self
            .arena
            .insert(DirectoryHandle::placeholder(volume_root), None);
        if let Some(node) = self.arena.get_mut(root) {
            node.expanded = true;
        }
        self.root = Some(root);
        root
    }

    /// Select the directory at `target`, materializing the path to it.
    ///
    /// Each level is searched among the materialized children first and
    /// refreshed at most once when the next segment is missing. A target that
    /// still cannot be found yields [`TreeError::NotFound`] and clears the
    /// selection. A failing root refresh clears the whole tree.
    pub async fn select_path(&mut self, target: &str) -> Result<NodeId> {
        let target = path::normalize(target);
        let target_handle = DirectoryHandle::real(target.as_str());

        if let Some(selected) = self.selected.and_then(|id| self.arena.get(id)) {
            if self.fs.is_same_entry(selected.handle(), &target_handle) {
                return Ok(selected.id());
            }
        }

        let volume_root = self.layout.volume_root(&target);
        let bound = self
            .root
            .filter(|_| self.root_path() == Some(volume_root.as_str()));
        let root = match bound {
            Some(root) => root,
            None => self.bind_root(&volume_root),
        };
        self.selected = None;

        let mut current = root;
        loop {
            let node = self.arena.get(current).ok_or(TreeError::Detached(current))?;
            if self.fs.is_same_entry(node.handle(), &target_handle) {
                if node.handle().is_placeholder() {
                    self.refresh_for_selection(current, root).await?;
                }
                self.reveal(current);
                self.selected = Some(current);
                return Ok(current);
            }

            current = match self.child_towards(current, &target) {
                Some(child) => child,
                None => {
                    self.refresh_for_selection(current, root).await?;
                    match self.child_towards(current, &target) {
                        Some(child) => child,
                        None => {
                            debug!(%target, "selection target not found");
                            return Err(TreeError::NotFound(target));
                        }
                    }
                }
            };
        }
    }

    async fn refresh_for_selection(&mut self, id: NodeId, root: NodeId) -> Result<()> {
        // Every level refreshed here ends up revealed, so its children are
        // checked even while it is still collapsed.
        match self.refresh(id, false, true).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if id == root {
                    warn!(error = %e, "root refresh failed, clearing tree");
                    self.clear();
                }
                Err(e)
            }
        }
    }

    /// Expand every ancestor of `id` so it is visible.
    fn reveal(&mut self, id: NodeId) {
        let mut current = self.arena.get(id).and_then(TreeNode::parent);
        while let Some(ancestor) = current {
            match self.arena.get_mut(ancestor) {
                Some(node) => {
                    node.expanded = true;
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    /// React to "directory at `changed` changed": refresh only the node owning
    /// it.
    ///
    /// Returns `false` without touching anything when no root is bound, the
    /// path is outside the root, or the directory is not materialized.
    pub async fn handle_external_change(&mut self, changed: &str) -> Result<bool> {
        let changed = path::normalize(changed);
        let Some(root) = self.root else {
            return Ok(false);
        };

        let mut current = root;
        loop {
            let Some(node) = self.arena.get(current) else {
                return Ok(false);
            };
            if node.path() == changed {
                self.reconcile(current, false).await?;
                return Ok(true);
            }
            if !is_parent_path(node.path(), &changed) {
                return Ok(false);
            }
            match self.child_towards(current, &changed) {
                Some(child) => current = child,
                None => return Ok(false),
            }
        }
    }

    /// Refresh whatever a watcher change batch touched. A batch naming the
    /// root refreshes the whole visible tree, so changes inside expanded
    /// subdirectories are not lost. Failures of single directories are logged.
    ///
    /// Returns `true` if any node was refreshed.
    pub async fn apply_changes(&mut self, changes: &ChangeSet) -> Result<bool> {
        match changes {
            ChangeSet::Root => match self.root {
                Some(root) => {
                    self.reconcile(root, true).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
            ChangeSet::Dirs(dirs) => {
                let mut refreshed = false;
                for dir in dirs {
                    match self.handle_external_change(dir).await {
                        Ok(hit) => refreshed |= hit,
                        Err(e) => warn!(%dir, error = %e, "refresh after change failed"),
                    }
                }
                Ok(refreshed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFs;

    fn tree_with(fs: &Arc<MockFs>) -> DirectoryTree {
        DirectoryTree::new(fs.clone(), FileFilter::default(), VolumeLayout::default())
    }

    fn child_paths(tree: &DirectoryTree, id: NodeId) -> Vec<String> {
        tree.children(id)
            .iter()
            .map(|c| tree.node(*c).unwrap().path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn select_materializes_one_level_per_refresh() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x", "z"]);
        fs.add_dirs("/root/x", &["y"]);
        let mut tree = tree_with(&fs);

        let id = tree.select_path("/root/x/y").await.unwrap();

        assert_eq!(tree.node(id).unwrap().path(), "/root/x/y");
        assert_eq!(tree.selected(), Some(id));
        assert_eq!(tree.current_path(), Some("/root/x/y"));
        assert_eq!(fs.enumerate_calls("/root"), 1);
        assert_eq!(fs.enumerate_calls("/root/x"), 1);
        assert_eq!(fs.total_enumerations(), 2);
    }

    #[tokio::test]
    async fn select_missing_segment_is_not_found_after_one_retry() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        let mut tree = tree_with(&fs);

        let err = tree.select_path("/root/x/y").await.unwrap_err();

        assert!(matches!(err, TreeError::NotFound(ref p) if p == "/root/x/y"));
        assert_eq!(fs.enumerate_calls("/root"), 1);
        assert_eq!(tree.selected(), None);
    }

    #[tokio::test]
    async fn select_reveals_ancestors() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x"]);
        fs.add_dirs("/root/x", &["y"]);
        let mut tree = tree_with(&fs);

        tree.select_path("/root/x/y").await.unwrap();
        let x = tree.find_by_path("/root/x").unwrap();
        assert!(tree.node(x).unwrap().is_expanded());
    }

    #[tokio::test]
    async fn reselecting_same_path_does_no_io() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x"]);
        let mut tree = tree_with(&fs);

        let first = tree.select_path("/root/x").await.unwrap();
        let before = fs.total_enumerations();
        let second = tree.select_path("/root/x").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fs.total_enumerations(), before);
    }

    #[tokio::test]
    async fn select_uses_materialized_children_first() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a", "b"]);
        let mut tree = tree_with(&fs);

        tree.select_path("/root/a").await.unwrap();
        tree.select_path("/root/b").await.unwrap();

        assert_eq!(fs.enumerate_calls("/root"), 1);
    }

    #[tokio::test]
    async fn select_on_other_volume_rebinds_root() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/Downloads", &["music"]);
        let mut tree = tree_with(&fs);

        let a = tree.select_path("/root/a").await.unwrap();
        let old_root = tree.root().unwrap();
        tree.select_path("/Downloads/music").await.unwrap();

        assert_eq!(tree.root_path(), Some("/Downloads"));
        assert!(!tree.is_attached(a));
        assert!(!tree.is_attached(old_root));
        assert_eq!(tree.len(), 2);
    }

    #[tokio::test]
    async fn select_search_root_binds_remote_root() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/drive", &["root", "other"]);
        let mut tree = tree_with(&fs);

        let id = tree.select_path("/drive_recent").await.unwrap();

        assert_eq!(tree.root_path(), Some("/drive"));
        assert_eq!(tree.node(id).unwrap().label(), "Recent");
        let root = tree.root().unwrap();
        assert_eq!(
            child_paths(&tree, root),
            vec!["/drive_offline", "/drive_recent", "/drive/root"]
        );
    }

    #[tokio::test]
    async fn select_volume_root_resolves_placeholder() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        let mut tree = tree_with(&fs);

        let id = tree.select_path("/root").await.unwrap();

        assert_eq!(Some(id), tree.root());
        assert!(!tree.node(id).unwrap().handle().is_placeholder());
        assert_eq!(child_paths(&tree, id), vec!["/root/a"]);
    }

    #[tokio::test]
    async fn unresolved_root_clears_tree() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/drive", &["root"]);
        fs.keep_unresolved("/drive");
        let mut tree = tree_with(&fs);

        let err = tree.select_path("/drive/root").await.unwrap_err();

        assert!(matches!(err, TreeError::UnresolvedPlaceholder(_)));
        assert_eq!(fs.resolve_calls("/drive"), 1);
        assert!(tree.root().is_none());
        assert!(tree.is_empty());
    }

    #[tokio::test]
    async fn io_error_leaves_children_untouched() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a", "b"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let root = tree.root().unwrap();
        let before = tree.children(root).to_vec();

        fs.fail_enumeration("/root");
        let err = tree.reconcile(root, false).await.unwrap_err();

        assert!(matches!(err, TreeError::Io(_)));
        assert_eq!(tree.children(root), before.as_slice());

        fs.heal("/root");
        fs.add_dirs("/root", &["a"]);
        let summary = tree.reconcile(root, false).await.unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(tree.children(root), &before[..1]);
    }

    #[tokio::test]
    async fn reconcile_twice_is_idempotent() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a", "b"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let root = tree.root().unwrap();
        let before = tree.children(root).to_vec();

        let summary = tree.reconcile(root, false).await.unwrap();

        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.removed, 0);
        assert_eq!(tree.children(root), before.as_slice());
    }

    #[tokio::test]
    async fn external_change_refreshes_owning_node_only() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x", "y"]);
        fs.add_dirs("/root/x", &["deep"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/x/deep").await.unwrap();
        let root_calls = fs.enumerate_calls("/root");

        fs.add_dirs("/root/x", &["deep", "new"]);
        assert!(tree.handle_external_change("/root/x").await.unwrap());

        let x = tree.find_by_path("/root/x").unwrap();
        assert_eq!(child_paths(&tree, x), vec!["/root/x/deep", "/root/x/new"]);
        assert_eq!(fs.enumerate_calls("/root"), root_calls);
    }

    #[tokio::test]
    async fn external_change_outside_tree_is_ignored() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x"]);
        let mut tree = tree_with(&fs);

        assert!(!tree.handle_external_change("/root").await.unwrap());

        tree.select_path("/root/x").await.unwrap();
        let before = fs.total_enumerations();
        assert!(!tree.handle_external_change("/elsewhere/a").await.unwrap());
        assert!(!tree.handle_external_change("/root/x/unmaterialized").await.unwrap());
        assert_eq!(fs.total_enumerations(), before);
    }

    #[tokio::test]
    async fn external_removal_detaches_subtree() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x", "y"]);
        fs.add_dirs("/root/x", &["deep"]);
        let mut tree = tree_with(&fs);
        let deep = tree.select_path("/root/x/deep").await.unwrap();

        fs.add_dirs("/root", &["y"]);
        tree.handle_external_change("/root").await.unwrap();

        assert!(!tree.is_attached(deep));
        assert_eq!(tree.selected(), None);
        assert_eq!(child_paths(&tree, tree.root().unwrap()), vec!["/root/y"]);
    }

    #[tokio::test]
    async fn expand_cascades_into_expanded_descendants() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["b"]);
        fs.add_dirs("/root/a/b", &["c"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/a/b/c").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        tree.collapse(a).unwrap();
        fs.add_dirs("/root/a/b", &["c", "d"]);
        let summary = tree.expand(a).await.unwrap();

        let b = tree.find_by_path("/root/a/b").unwrap();
        assert_eq!(child_paths(&tree, b), vec!["/root/a/b/c", "/root/a/b/d"]);
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.inserted, 1);
    }

    #[tokio::test]
    async fn expand_failure_collapses_node() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        fs.fail_enumeration("/root/a");
        assert!(tree.expand(a).await.is_err());
        assert!(!tree.node(a).unwrap().is_expanded());
    }

    #[tokio::test]
    async fn expanding_empty_directory_leaves_it_collapsed() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["empty"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let empty = tree.find_by_path("/root/empty").unwrap();

        tree.expand(empty).await.unwrap();

        let node = tree.node(empty).unwrap();
        assert!(!node.is_expanded());
        assert!(!node.has_children());
    }

    #[tokio::test]
    async fn cascade_failure_keeps_descendant_children() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["b"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/a/b").await.unwrap();
        let root = tree.root().unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        fs.fail_enumeration("/root/a");
        let summary = tree.reconcile(root, true).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(child_paths(&tree, a), vec!["/root/a/b"]);
    }

    #[tokio::test]
    async fn filter_change_refreshes_whole_tree() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &[".hidden", "a"]);
        fs.add_dirs("/root/a", &[".cache", "src"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/a/src").await.unwrap();
        let root = tree.root().unwrap();
        let a = tree.find_by_path("/root/a").unwrap();
        assert_eq!(child_paths(&tree, root), vec!["/root/a"]);

        tree.set_filter(FileFilter::allow_all()).await.unwrap();

        assert_eq!(child_paths(&tree, root), vec!["/root/.hidden", "/root/a"]);
        assert_eq!(child_paths(&tree, a), vec!["/root/a/.cache", "/root/a/src"]);
    }

    #[tokio::test]
    async fn superseded_refresh_is_dropped() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let root = tree.root().unwrap();
        let fetcher = tree.fetcher();

        let older = tree.begin_refresh(root, false).unwrap();
        let older_listing = fetcher.fetch(&older).await;
        fs.add_dirs("/root", &["a", "b"]);
        let newer = tree.begin_refresh(root, false).unwrap();
        let newer_listing = fetcher.fetch(&newer).await;

        let applied = tree.apply_listing(newer, newer_listing).unwrap();
        assert!(matches!(applied, ApplyOutcome::Applied(_)));
        let stale = tree.apply_listing(older, older_listing).unwrap();
        assert_eq!(stale, ApplyOutcome::Stale);
        assert_eq!(child_paths(&tree, root), vec!["/root/a", "/root/b"]);
    }

    #[tokio::test]
    async fn listing_for_detached_node_is_dropped() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["inner"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let root = tree.root().unwrap();
        let a = tree.find_by_path("/root/a").unwrap();
        let fetcher = tree.fetcher();

        let ticket = tree.begin_refresh(a, false).unwrap();
        fs.add_dirs("/root", &[]);
        tree.reconcile(root, false).await.unwrap();
        let listing = fetcher.fetch(&ticket).await;

        assert_eq!(tree.apply_listing(ticket, listing).unwrap(), ApplyOutcome::Stale);
        assert!(!tree.is_attached(a));
    }

    #[tokio::test]
    async fn stale_failure_is_not_reported() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root").await.unwrap();
        let root = tree.root().unwrap();

        let older = tree.begin_refresh(root, false).unwrap();
        let _newer = tree.begin_refresh(root, false).unwrap();
        let failed: Result<Listing> = Err(TreeError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "late failure",
        )));

        assert_eq!(tree.apply_listing(older, failed).unwrap(), ApplyOutcome::Stale);
    }

    #[tokio::test]
    async fn collapsed_child_reports_subdirectories_without_listing() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["b", "c"]);
        let mut tree = tree_with(&fs);
        let root = tree.select_path("/root").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        let node = tree.node(a).unwrap();
        assert!(node.has_children());
        assert!(!node.is_expanded());
        assert!(node.children().is_empty());
        assert_eq!(fs.enumerate_calls("/root/a"), 0);

        let summary = tree.reconcile(root, true).await.unwrap();
        assert_eq!(summary.checked, 1);
        assert!(tree.node(a).unwrap().has_children());

        fs.add_dirs("/root/a", &[]);
        tree.reconcile(root, false).await.unwrap();
        assert!(!tree.node(a).unwrap().has_children());
        assert_eq!(fs.enumerate_calls("/root/a"), 0);
    }

    #[tokio::test]
    async fn selection_checks_siblings_along_the_path() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["x", "z"]);
        fs.add_dirs("/root/x", &["y", "w"]);
        fs.add_dirs("/root/x/w", &["deep"]);
        let mut tree = tree_with(&fs);

        tree.select_path("/root/x/y").await.unwrap();

        let w = tree.find_by_path("/root/x/w").unwrap();
        let z = tree.find_by_path("/root/z").unwrap();
        assert!(tree.node(w).unwrap().has_children());
        assert!(!tree.node(z).unwrap().has_children());
        assert_eq!(fs.enumerate_calls("/root/x/w"), 0);
    }

    #[tokio::test]
    async fn failed_check_leaves_flag_alone() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["b"]);
        let mut tree = tree_with(&fs);
        let root = tree.select_path("/root").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        fs.fail_enumeration("/root/a");
        tree.reconcile(root, false).await.unwrap();
        assert!(tree.node(a).unwrap().has_children());
    }

    #[tokio::test]
    async fn root_change_refreshes_expanded_subdirectories() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a"]);
        fs.add_dirs("/root/a", &["b"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/a/b").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        fs.add_dirs("/root/a", &["b", "c"]);
        tree.handle_external_change("/root").await.unwrap();
        assert_eq!(child_paths(&tree, a), vec!["/root/a/b"]);

        assert!(tree.apply_changes(&ChangeSet::Root).await.unwrap());
        assert_eq!(child_paths(&tree, a), vec!["/root/a/b", "/root/a/c"]);
    }

    #[tokio::test]
    async fn directory_changes_refresh_each_owner() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &["a", "b"]);
        fs.add_dirs("/root/a", &["x"]);
        let mut tree = tree_with(&fs);
        tree.select_path("/root/a/x").await.unwrap();
        let a = tree.find_by_path("/root/a").unwrap();

        fs.add_dirs("/root/a", &["x", "y"]);
        fs.add_dirs("/root", &["a", "b", "c"]);
        let dirs = ["/root", "/root/a", "/root/unknown"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(tree.apply_changes(&ChangeSet::Dirs(dirs)).await.unwrap());
        assert_eq!(child_paths(&tree, a), vec!["/root/a/x", "/root/a/y"]);
        assert_eq!(
            child_paths(&tree, tree.root().unwrap()),
            vec!["/root/a", "/root/b", "/root/c"]
        );
    }

    #[tokio::test]
    async fn changes_without_root_do_nothing() {
        let fs = Arc::new(MockFs::new());
        let mut tree = tree_with(&fs);
        assert!(!tree.apply_changes(&ChangeSet::Root).await.unwrap());
        assert_eq!(fs.total_enumerations(), 0);
    }

    #[tokio::test]
    async fn empty_root_stays_expanded() {
        let fs = Arc::new(MockFs::new());
        fs.add_dirs("/root", &[]);
        let mut tree = tree_with(&fs);
        let root = tree.select_path("/root").await.unwrap();

        let node = tree.node(root).unwrap();
        assert!(node.is_expanded());
        assert!(!node.has_children());
    }
}
