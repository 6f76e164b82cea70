use super::handle::Entry;

/// Directory names hidden from the tree unless explicitly configured otherwise.
pub const DEFAULT_IGNORE_NAMES: &[&str] = &[".git", "node_modules", "__pycache__", "target"];

/// Predicate deciding which directories are visible in the tree.
///
/// One filter is shared by every node of a tree; replacing it triggers a
/// recursive refresh from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Show dot-directories.
    pub show_hidden: bool,
    /// Exact directory names that are always hidden.
    pub ignore: Vec<String>,
}

impl FileFilter {
    /// Filter that lets every directory through.
    pub fn allow_all() -> Self {
        Self {
            show_hidden: true,
            ignore: Vec::new(),
        }
    }

    /// Whether `entry` should be kept.
    pub fn accepts(&self, entry: &Entry) -> bool {
        self.accepts_name(&entry.name)
    }

    pub fn accepts_name(&self, name: &str) -> bool {
        if !self.show_hidden && name.starts_with('.') {
            return false;
        }
        !self.ignore.iter().any(|pattern| pattern == name)
    }
}
