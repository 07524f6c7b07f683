use std::collections::{BTreeMap, HashMap};

use arbor_core::{CanonicalPath, NormalizedPath};
use arbor_vfs::WatcherHandle;

/// Observable state of a configuration-file path, for assertions and
/// diagnostics.
///
/// - `Ghost`: open files have probed the path, none of them is an inferred
///   root, no project adopted it.
/// - `GhostWatched`: at least one probing file is an inferred root, so a
///   watcher waits for the config to appear (or change).
/// - `Adopted`: a configured project owns the path; the project's own
///   watcher covers it, the presence watcher stays down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Absent,
    Ghost,
    GhostWatched,
    Adopted,
}

/// Per-config-path cache: existence, the open files whose upward search
/// visited the path, and the optional watcher.
#[derive(Debug)]
pub(crate) struct ConfigFileEntry {
    path: NormalizedPath,
    pub exists: bool,
    /// Tracking script → whether that script is currently an inferred root.
    /// The root flag latches upward on re-probe and is cleared explicitly
    /// when the script stops being an inferred root.
    tracking: BTreeMap<CanonicalPath, bool>,
    watcher: Option<WatcherHandle>,
}

impl ConfigFileEntry {
    pub fn new(path: NormalizedPath, exists: bool) -> Self {
        Self { path, exists, tracking: BTreeMap::new(), watcher: None }
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn track(&mut self, script: CanonicalPath, is_root: bool) {
        self.tracking.entry(script).and_modify(|root| *root |= is_root).or_insert(is_root);
    }

    pub fn untrack(&mut self, script: &CanonicalPath) -> bool {
        self.tracking.remove(script).is_some()
    }

    pub fn tracks(&self, script: &CanonicalPath) -> bool {
        self.tracking.contains_key(script)
    }

    pub fn set_root(&mut self, script: &CanonicalPath, is_root: bool) {
        if let Some(flag) = self.tracking.get_mut(script) {
            *flag = is_root;
        }
    }

    pub fn tracker_scripts(&self) -> Vec<CanonicalPath> {
        self.tracking.keys().cloned().collect()
    }

    pub fn has_root_tracker(&self) -> bool {
        self.tracking.values().any(|root| *root)
    }

    pub fn is_untracked(&self) -> bool {
        self.tracking.is_empty()
    }

    pub fn has_watcher(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn set_watcher(&mut self, handle: WatcherHandle) {
        self.watcher = Some(handle);
    }

    pub fn take_watcher(&mut self) -> Option<WatcherHandle> {
        self.watcher.take()
    }
}

/// The config-presence table: one entry per configuration-file path that is
/// either adopted by a configured project or visited by an open file's
/// upward search.
#[derive(Debug, Default)]
pub(crate) struct ConfigPresence {
    entries: HashMap<CanonicalPath, ConfigFileEntry>,
}

impl ConfigPresence {
    pub fn get(&self, path: &CanonicalPath) -> Option<&ConfigFileEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &CanonicalPath) -> Option<&mut ConfigFileEntry> {
        self.entries.get_mut(path)
    }

    pub fn entry_or_insert_with(
        &mut self,
        path: CanonicalPath,
        make: impl FnOnce() -> ConfigFileEntry,
    ) -> &mut ConfigFileEntry {
        self.entries.entry(path).or_insert_with(make)
    }

    pub fn remove(&mut self, path: &CanonicalPath) -> Option<ConfigFileEntry> {
        self.entries.remove(path)
    }

    /// Paths whose entry tracks `script`, sorted for deterministic
    /// processing.
    pub fn paths_tracking(&self, script: &CanonicalPath) -> Vec<CanonicalPath> {
        let mut paths: Vec<CanonicalPath> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.tracks(script))
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalPath, &ConfigFileEntry)> {
        self.entries.iter()
    }
}
