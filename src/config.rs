//! Configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--all`)
//! 2. `$DTREE_CONFIG` environment variable (path to config file)
//! 3. Project-local `.dtree.toml` in the current working directory
//! 4. Global `~/.config/dtree/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::fs::watcher::{DEFAULT_DEBOUNCE_MS, DEFAULT_FLOOD_THRESHOLD};
use crate::fs::FileFilter;
use crate::tree::volume::{SearchRoot, VolumeLayout};

// ── Section configs ──────────────────────────────────────────────────────────

/// Which directories are visible.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Show dot-directories.
    pub show_hidden: Option<bool>,
    /// Directory names that are never shown.
    pub ignore: Option<Vec<String>>,
}

/// A virtual search shortcut shown at the remote volume root.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SearchRootConfig {
    pub path: String,
    pub label: String,
}

/// How the virtual namespace is split into volumes.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VolumesConfig {
    /// Root of the remote (cloud) volume.
    pub remote_root: Option<String>,
    /// Sub-directory names of the remote root that are never listed.
    pub remote_hidden: Option<Vec<String>>,
    /// Sub-directory of the remote root that gets a display label.
    pub my_drive: Option<String>,
    /// Label for `my_drive`.
    pub my_drive_label: Option<String>,
    /// Search shortcuts appended to the remote root listing.
    pub search_roots: Option<Vec<SearchRootConfig>>,
    /// Parents whose children are volumes of their own (`/removable/usb`).
    pub nested_parents: Option<Vec<String>>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable the filesystem watcher.
    pub enabled: Option<bool>,
    /// Debounce interval in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Change batches larger than this collapse into a root refresh.
    pub flood_threshold: Option<usize>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub filter: FilterConfig,
    pub volumes: VolumesConfig,
    pub watcher: WatcherConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default remote volume root.
pub const DEFAULT_REMOTE_ROOT: &str = "/drive";
/// Default hidden sub-directory of the remote root.
pub const DEFAULT_REMOTE_HIDDEN: &str = "other";
/// Default labelled sub-directory of the remote root.
pub const DEFAULT_MY_DRIVE: &str = "root";
/// Default label of the `my_drive` sub-directory.
pub const DEFAULT_MY_DRIVE_LABEL: &str = "My Drive";
/// Default nested volume parents.
pub const DEFAULT_NESTED_PARENTS: &[&str] = &["/removable", "/archive"];

fn default_search_roots() -> Vec<SearchRootConfig> {
    vec![
        SearchRootConfig {
            path: "/drive_recent".to_string(),
            label: "Recent".to_string(),
        },
        SearchRootConfig {
            path: "/drive_offline".to_string(),
            label: "Offline".to_string(),
        },
    ]
}

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order. The CLI `--config` path is
/// handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("DTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".dtree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("dtree").join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file. `None` if missing or unparsable
/// (the latter logged as a warning).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            filter: FilterConfig {
                show_hidden: other.filter.show_hidden.or(self.filter.show_hidden),
                ignore: other.filter.ignore.clone().or(self.filter.ignore),
            },
            volumes: VolumesConfig {
                remote_root: other
                    .volumes
                    .remote_root
                    .clone()
                    .or(self.volumes.remote_root),
                remote_hidden: other
                    .volumes
                    .remote_hidden
                    .clone()
                    .or(self.volumes.remote_hidden),
                my_drive: other.volumes.my_drive.clone().or(self.volumes.my_drive),
                my_drive_label: other
                    .volumes
                    .my_drive_label
                    .clone()
                    .or(self.volumes.my_drive_label),
                search_roots: other
                    .volumes
                    .search_roots
                    .clone()
                    .or(self.volumes.search_roots),
                nested_parents: other
                    .volumes
                    .nested_parents
                    .clone()
                    .or(self.volumes.nested_parents),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
                flood_threshold: other
                    .watcher
                    .flood_threshold
                    .or(self.watcher.flood_threshold),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so higher-priority files overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn show_hidden(&self) -> bool {
        self.filter.show_hidden.unwrap_or(false)
    }

    pub fn ignore_names(&self) -> Vec<String> {
        self.filter.ignore.clone().unwrap_or_else(|| {
            crate::fs::filter::DEFAULT_IGNORE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn remote_root(&self) -> &str {
        self.volumes
            .remote_root
            .as_deref()
            .unwrap_or(DEFAULT_REMOTE_ROOT)
    }

    pub fn remote_hidden(&self) -> Vec<String> {
        self.volumes
            .remote_hidden
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_REMOTE_HIDDEN.to_string()])
    }

    pub fn my_drive(&self) -> &str {
        self.volumes.my_drive.as_deref().unwrap_or(DEFAULT_MY_DRIVE)
    }

    pub fn my_drive_label(&self) -> &str {
        self.volumes
            .my_drive_label
            .as_deref()
            .unwrap_or(DEFAULT_MY_DRIVE_LABEL)
    }

    pub fn search_roots(&self) -> Vec<SearchRootConfig> {
        self.volumes
            .search_roots
            .clone()
            .unwrap_or_else(default_search_roots)
    }

    pub fn nested_parents(&self) -> Vec<String> {
        self.volumes.nested_parents.clone().unwrap_or_else(|| {
            DEFAULT_NESTED_PARENTS
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }

    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.watcher.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)
    }

    pub fn flood_threshold(&self) -> usize {
        self.watcher
            .flood_threshold
            .unwrap_or(DEFAULT_FLOOD_THRESHOLD)
    }

    /// The active file filter described by this config.
    pub fn file_filter(&self) -> FileFilter {
        FileFilter {
            show_hidden: self.show_hidden(),
            ignore: self.ignore_names(),
        }
    }

    /// Volume layout described by this config.
    pub fn volume_layout(&self) -> VolumeLayout {
        VolumeLayout {
            remote_root: crate::fs::path::normalize(self.remote_root()),
            remote_hidden: self.remote_hidden(),
            my_drive: self.my_drive().to_string(),
            my_drive_label: self.my_drive_label().to_string(),
            search_roots: self
                .search_roots()
                .into_iter()
                .map(|r| SearchRoot {
                    path: crate::fs::path::normalize(&r.path),
                    label: r.label,
                })
                .collect(),
            nested_parents: self
                .nested_parents()
                .iter()
                .map(|p| crate::fs::path::normalize(p))
                .collect(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
