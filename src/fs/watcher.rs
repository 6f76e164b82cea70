use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use tokio::sync::mpsc;
use tracing::warn;

use super::path;
use super::provider::LocalFs;
use crate::event::TreeEvent;

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default flood threshold (events per debounce window).
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Watches a host directory and forwards debounced change batches to the
/// tree's event loop.
pub struct FsWatcher {
    /// Handle to the debouncer (dropped to stop watching).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl FsWatcher {
    /// Watch `root` recursively.
    ///
    /// Paths with a component listed in `ignore_patterns` are dropped. A batch
    /// larger than `flood_threshold` collapses into a single `root` change,
    /// which the tree handles as a refresh of its root.
    pub fn new(
        root: &Path,
        debounce_duration: Duration,
        ignore_patterns: Vec<String>,
        flood_threshold: usize,
        event_tx: mpsc::UnboundedSender<TreeEvent>,
    ) -> notify::Result<Self> {
        let root_path = root.to_path_buf();

        let mut debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                match result {
                    Ok(events) => {
                        let paths: Vec<PathBuf> = events
                            .iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .map(|e| e.path.clone())
                            .filter(|p| {
                                let relative = p.strip_prefix(&root_path).unwrap_or(p);
                                !should_ignore(relative, &ignore_patterns)
                            })
                            .collect();

                        if paths.is_empty() {
                            return;
                        }

                        let _ = event_tx.send(TreeEvent::FsChange(collapse_flood(
                            paths,
                            flood_threshold,
                            &root_path,
                        )));
                    }
                    Err(err) => {
                        warn!(%err, "filesystem watcher error");
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        Ok(Self {
            _debouncer: debouncer,
        })
    }
}

/// True if any component of `path` matches one of `patterns` exactly.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| *p == name)
        }
        _ => false,
    })
}

/// Replace an oversized batch with a single change at `root`.
pub fn collapse_flood(paths: Vec<PathBuf>, threshold: usize, root: &Path) -> Vec<PathBuf> {
    if paths.len() > threshold {
        vec![root.to_path_buf()]
    } else {
        paths
    }
}

/// Tree directories touched by one change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSet {
    /// The batch names the watched root itself (a collapsed flood or a change
    /// of the root entry). Anything visible may be stale.
    Root,
    /// Directories whose listings changed.
    Dirs(BTreeSet<String>),
}

/// Map a batch of host paths to the tree directories whose listings they
/// affect. A changed entry alters its parent's listing; paths outside the
/// base are skipped.
pub fn changed_dirs(fs: &LocalFs, root_path: &str, paths: &[PathBuf]) -> ChangeSet {
    let mut dirs = BTreeSet::new();
    for host in paths {
        let Some(virtual_path) = fs.virtual_path(host) else {
            continue;
        };
        if virtual_path == root_path {
            return ChangeSet::Root;
        }
        let dir = path::parent(&virtual_path).unwrap_or(&virtual_path);
        dirs.insert(dir.to_string());
    }
    ChangeSet::Dirs(dirs)
}
