use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;

use super::filter::FileFilter;
use super::handle::{DirectoryHandle, Entry};
use super::path;

/// Filesystem collaborator consumed by the tree.
///
/// All calls are asynchronous requests; the tree never blocks on them.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List every entry (files included) directly under `path`.
    async fn enumerate_children(&self, path: &str) -> io::Result<Vec<Entry>>;

    /// Resolve a placeholder path to a concrete handle. May return another
    /// placeholder when the target is still unavailable.
    async fn resolve_placeholder(&self, path: &str) -> io::Result<DirectoryHandle>;

    /// Whether `path` has at least one sub-directory that passes `filter`.
    /// Used to decide if a collapsed node can be expanded without listing it
    /// into the tree.
    async fn has_subdirectories(&self, path: &str, filter: &FileFilter) -> io::Result<bool> {
        Ok(self
            .enumerate_children(path)
            .await?
            .iter()
            .any(|entry| entry.is_directory && filter.accepts(entry)))
    }

    /// Whether two handles denote the same directory.
    fn is_same_entry(&self, a: &DirectoryHandle, b: &DirectoryHandle) -> bool {
        a.path == b.path
    }
}

/// [`FileSystem`] backed by a directory on the host, using `tokio::fs`.
///
/// The virtual path `/a/b` maps to `<base>/a/b`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    base: PathBuf,
}

impl LocalFs {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Host path for a virtual tree path.
    pub fn host_path(&self, virtual_path: &str) -> PathBuf {
        let relative = virtual_path.trim_start_matches(path::SEPARATOR);
        if relative.is_empty() {
            self.base.clone()
        } else {
            self.base.join(relative)
        }
    }

    /// Virtual tree path for a host path below the base, if any.
    pub fn virtual_path(&self, host: &Path) -> Option<String> {
        let relative = host.strip_prefix(&self.base).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Some(path::normalize(&joined))
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn enumerate_children(&self, dir: &str) -> io::Result<Vec<Entry>> {
        let mut read_dir = tokio::fs::read_dir(self.host_path(dir)).await?;
        let mut entries = Vec::new();

        while let Some(item) = read_dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().to_string();
            let file_type = match item.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };
            // Follow symlinks so linked directories show up; broken links are skipped.
            let is_directory = if file_type.is_symlink() {
                match tokio::fs::metadata(item.path()).await {
                    Ok(meta) => meta.is_dir(),
                    Err(_) => continue,
                }
            } else {
                file_type.is_dir()
            };
            entries.push(Entry {
                path: path::join(dir, &name),
                name,
                is_directory,
                is_virtual: false,
            });
        }

        trace!(dir, count = entries.len(), "enumerated host directory");
        Ok(entries)
    }

    async fn resolve_placeholder(&self, virtual_path: &str) -> io::Result<DirectoryHandle> {
        match tokio::fs::metadata(self.host_path(virtual_path)).await {
            Ok(meta) if meta.is_dir() => Ok(DirectoryHandle::real(virtual_path)),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", virtual_path),
            )),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(DirectoryHandle::placeholder(virtual_path))
            }
            Err(e) => Err(e),
        }
    }
}
