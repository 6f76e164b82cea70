use serde::Serialize;

use super::path;

/// What a handle stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    /// A directory that exists on the backing filesystem.
    Real,
    /// Stand-in for a root that has not been resolved yet (e.g. an unmounted
    /// cloud volume). Must be resolved before it can be enumerated.
    Placeholder,
    /// Synthesized search shortcut shown at a remote volume root. Never has
    /// children.
    SearchRoot,
}

/// Reference to a real or virtual directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryHandle {
    pub path: String,
    pub name: String,
    /// Display override; falls back to `name`.
    pub label: Option<String>,
    pub kind: HandleKind,
}

impl DirectoryHandle {
    /// Handle for a real directory at `path`.
    pub fn real(path: impl Into<String>) -> Self {
        Self::with_kind(path, HandleKind::Real)
    }

    /// Placeholder handle for a directory that still needs resolving.
    pub fn placeholder(path: impl Into<String>) -> Self {
        Self::with_kind(path, HandleKind::Placeholder)
    }

    /// Virtual search shortcut with a fixed label.
    pub fn search_root(path: impl Into<String>, label: impl Into<String>) -> Self {
        let mut handle = Self::with_kind(path, HandleKind::SearchRoot);
        handle.label = Some(label.into());
        handle
    }

    fn with_kind(path: impl Into<String>, kind: HandleKind) -> Self {
        let path = path.into();
        let name = path::file_name(&path).to_string();
        Self {
            path,
            name,
            label: None,
            kind,
        }
    }

    /// Builder-style label override.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Text shown for this directory.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == HandleKind::Placeholder
    }
}

/// A single item returned by a directory enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    /// Virtual entries are turned into placeholder handles.
    pub is_virtual: bool,
}

impl Entry {
    pub fn directory(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path::file_name(&path).to_string();
        Self {
            path,
            name,
            is_directory: true,
            is_virtual: false,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            is_directory: false,
            ..Self::directory(path)
        }
    }

    /// Convert into a handle, keeping the virtual flag as a placeholder kind.
    pub fn into_handle(self) -> DirectoryHandle {
        DirectoryHandle {
            path: self.path,
            name: self.name,
            label: None,
            kind: if self.is_virtual {
                HandleKind::Placeholder
            } else {
                HandleKind::Real
            },
        }
    }
}
