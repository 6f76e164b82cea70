//! In-memory [`FileSystem`] double with call counters and failure injection.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::fs::{path, DirectoryHandle, Entry, FileFilter, FileSystem};

#[derive(Default)]
struct MockState {
    listings: HashMap<String, Vec<Entry>>,
    failing: HashSet<String>,
    unresolved: HashSet<String>,
    enumerate_calls: HashMap<String, usize>,
    resolve_calls: HashMap<String, usize>,
    subdir_checks: HashMap<String, usize>,
}

#[derive(Default)]
pub struct MockFs {
    state: Mutex<MockState>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Replace the listing of `dir`.
    pub fn add_entries(&self, dir: &str, entries: Vec<Entry>) {
        self.state().listings.insert(dir.to_string(), entries);
    }

    /// Replace the listing of `dir` with sub-directories called `names`, and
    /// make each of them an existing (empty unless listed later) directory.
    pub fn add_dirs(&self, dir: &str, names: &[&str]) {
        let mut state = self.state();
        let entries: Vec<Entry> = names
            .iter()
            .map(|name| Entry::directory(path::join(dir, name)))
            .collect();
        for entry in &entries {
            state.listings.entry(entry.path.clone()).or_default();
        }
        state.listings.insert(dir.to_string(), entries);
    }

    pub fn fail_enumeration(&self, dir: &str) {
        self.state().failing.insert(dir.to_string());
    }

    pub fn heal(&self, dir: &str) {
        self.state().failing.remove(dir);
    }

    /// Make `resolve_placeholder(dir)` keep returning a placeholder.
    pub fn keep_unresolved(&self, dir: &str) {
        self.state().unresolved.insert(dir.to_string());
    }

    pub fn enumerate_calls(&self, dir: &str) -> usize {
        self.state().enumerate_calls.get(dir).copied().unwrap_or(0)
    }

    pub fn total_enumerations(&self) -> usize {
        self.state().enumerate_calls.values().sum()
    }

    pub fn resolve_calls(&self, dir: &str) -> usize {
        self.state().resolve_calls.get(dir).copied().unwrap_or(0)
    }

    pub fn subdir_checks(&self, dir: &str) -> usize {
        self.state().subdir_checks.get(dir).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FileSystem for MockFs {
    async fn enumerate_children(&self, dir: &str) -> io::Result<Vec<Entry>> {
        let mut state = self.state();
        *state.enumerate_calls.entry(dir.to_string()).or_default() += 1;
        if state.failing.contains(dir) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        state
            .listings
            .get(dir)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, dir.to_string()))
    }

    async fn has_subdirectories(&self, dir: &str, filter: &FileFilter) -> io::Result<bool> {
        let mut state = self.state();
        *state.subdir_checks.entry(dir.to_string()).or_default() += 1;
        if state.failing.contains(dir) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
        }
        let entries = state
            .listings
            .get(dir)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, dir.to_string()))?;
        Ok(entries
            .iter()
            .any(|entry| entry.is_directory && filter.accepts(entry)))
    }

    async fn resolve_placeholder(&self, dir: &str) -> io::Result<DirectoryHandle> {
        let mut state = self.state();
        *state.resolve_calls.entry(dir.to_string()).or_default() += 1;
        if state.unresolved.contains(dir) {
            return Ok(DirectoryHandle::placeholder(dir));
        }
        if state.listings.contains_key(dir) {
            Ok(DirectoryHandle::real(dir))
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, dir.to_string()))
        }
    }
}
