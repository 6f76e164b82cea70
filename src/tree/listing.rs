use tracing::debug;

use super::reconcile::entry_order;
use super::volume::VolumeLayout;
use crate::error::{Result, TreeError};
use crate::fs::{DirectoryHandle, FileFilter, FileSystem, HandleKind};

/// Directory listing ready to be reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Concrete handle that replaced a placeholder during the fetch.
    pub resolved: Option<DirectoryHandle>,
    /// Visible sub-directories, sorted by [`entry_order`].
    pub entries: Vec<DirectoryHandle>,
}

/// Fetch the visible sub-directories of `handle`.
///
/// A placeholder is resolved first, with exactly one resolution attempt;
/// getting another placeholder back fails with
/// [`TreeError::UnresolvedPlaceholder`]. Search roots have no children and
/// are never enumerated.
pub async fn fetch_listing(
    fs: &dyn FileSystem,
    filter: &FileFilter,
    layout: &VolumeLayout,
    handle: &DirectoryHandle,
) -> Result<Listing> {
    let mut resolved = None;
    let dir = match handle.kind {
        HandleKind::SearchRoot => return Ok(Listing::default()),
        HandleKind::Placeholder => {
            let mut real = fs.resolve_placeholder(&handle.path).await?;
            if real.is_placeholder() {
                return Err(TreeError::UnresolvedPlaceholder(handle.path.clone()));
            }
            if real.label.is_none() {
                real.label = handle.label.clone();
            }
            debug!(path = %handle.path, "resolved placeholder");
            resolved = Some(real.clone());
            real
        }
        HandleKind::Real => handle.clone(),
    };

    let mut entries: Vec<DirectoryHandle> = fs
        .enumerate_children(&dir.path)
        .await?
        .into_iter()
        .filter(|entry| entry.is_directory && filter.accepts(entry))
        .map(|entry| entry.into_handle())
        .collect();

    if layout.is_remote_root(&handle.path) {
        entries = layout.curate_remote_listing(entries);
    }
    sort_listing(&mut entries);

    Ok(Listing { resolved, entries })
}

/// Sort by case-insensitive name. Names equal up to case are ordered by their
/// case-sensitive path, not by enumeration order, so the result matches the
/// order the reconciler merges with.
pub fn sort_listing(entries: &mut [DirectoryHandle]) {
    entries.sort_by(entry_order);
}

/// Whether `handle` would list at least one child, without listing it.
///
/// Placeholders are not resolved here and report `false`; the remote root
/// always has its search shortcuts.
pub async fn check_has_children(
    fs: &dyn FileSystem,
    filter: &FileFilter,
    layout: &VolumeLayout,
    handle: &DirectoryHandle,
) -> Result<bool> {
    match handle.kind {
        HandleKind::SearchRoot | HandleKind::Placeholder => Ok(false),
        HandleKind::Real => {
            if layout.is_remote_root(&handle.path) && !layout.search_roots.is_empty() {
                return Ok(true);
            }
            Ok(fs.has_subdirectories(&handle.path, filter).await?)
        }
    }
}
