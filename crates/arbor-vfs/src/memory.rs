use std::collections::BTreeMap;
use std::io;

use arbor_core::NormalizedPath;
use parking_lot::Mutex;

use crate::host::ServerHost;
use crate::watch::{
    FileEventKind, SharedWatchRegistry, WatchNotification, WatcherHandle,
};

/// Deterministic in-memory host for tests and tools.
///
/// Filesystem mutations return the [`WatchNotification`]s that the active
/// watches would observe; the caller decides when (and whether) to deliver
/// them, so no test ever waits on an OS watcher.
pub struct MemoryHost {
    cwd: NormalizedPath,
    case_sensitive: bool,
    files: Mutex<BTreeMap<NormalizedPath, String>>,
    registry: SharedWatchRegistry,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::with_cwd("/")
    }

    pub fn with_cwd(cwd: &str) -> Self {
        Self {
            cwd: NormalizedPath::new_absolute(cwd),
            case_sensitive: true,
            files: Mutex::new(BTreeMap::new()),
            registry: SharedWatchRegistry::new(),
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Seed a file without producing watch notifications.
    pub fn seed_file(&self, path: &str, contents: &str) {
        let path = self.normalize(path);
        self.files.lock().insert(path, contents.to_string());
    }

    /// Create or overwrite a file, returning the notifications the change
    /// produces for active watches.
    pub fn create_file(&self, path: &str, contents: &str) -> Vec<WatchNotification> {
        let path = self.normalize(path);
        let existed = self.files.lock().insert(path.clone(), contents.to_string()).is_some();
        let kind = if existed { FileEventKind::Changed } else { FileEventKind::Created };
        self.registry.notifications_for(&path, kind)
    }

    pub fn change_file(&self, path: &str, contents: &str) -> Vec<WatchNotification> {
        let path = self.normalize(path);
        self.files.lock().insert(path.clone(), contents.to_string());
        self.registry.notifications_for(&path, FileEventKind::Changed)
    }

    pub fn delete_file(&self, path: &str) -> Vec<WatchNotification> {
        let path = self.normalize(path);
        if self.files.lock().remove(&path).is_none() {
            return Vec::new();
        }
        self.registry.notifications_for(&path, FileEventKind::Deleted)
    }

    /// Sorted paths of active single-file watches, for lifecycle assertions.
    pub fn watched_file_paths(&self) -> Vec<NormalizedPath> {
        self.registry.watched_file_paths()
    }

    pub fn active_watch_count(&self) -> usize {
        self.registry.active_count()
    }

    fn normalize(&self, path: &str) -> NormalizedPath {
        NormalizedPath::new(path, &self.cwd)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHost for MemoryHost {
    fn file_exists(&self, path: &NormalizedPath) -> bool {
        self.files.lock().contains_key(path)
    }

    fn read_file(&self, path: &NormalizedPath) -> io::Result<String> {
        self.files.lock().get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })
    }

    fn file_size(&self, path: &NormalizedPath) -> io::Result<u64> {
        self.files
            .lock()
            .get(path)
            .map(|contents| contents.len() as u64)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
            })
    }

    fn current_directory(&self) -> NormalizedPath {
        self.cwd.clone()
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        self.case_sensitive
    }

    fn watch_file(&self, path: &NormalizedPath) -> WatcherHandle {
        self.registry.register_file(path.clone())
    }

    fn watch_directory(&self, path: &NormalizedPath, recursive: bool) -> WatcherHandle {
        self.registry.register_directory(path.clone(), recursive)
    }
}
