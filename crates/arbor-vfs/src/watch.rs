use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arbor_core::NormalizedPath;
use parking_lot::Mutex;

/// Identifies one registered watch for the lifetime of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u64);

/// Event kinds delivered by watcher backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Changed,
    Deleted,
}

/// A change delivered to the consumer that registered `watch`.
///
/// `path` is the concrete path that changed; for recursive directory watches
/// it is a descendant of the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotification {
    pub watch: WatchId,
    pub path: NormalizedPath,
    pub kind: FileEventKind,
}

#[derive(Debug, Clone)]
struct WatchEntry {
    path: NormalizedPath,
    directory: bool,
    recursive: bool,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    entries: HashMap<WatchId, WatchEntry>,
}

/// The set of active watches for one host.
///
/// Shared between the host (which routes backend events through it) and the
/// [`WatcherHandle`]s (which cancel their entry on drop).
#[derive(Clone, Default)]
pub struct SharedWatchRegistry {
    state: Arc<Mutex<RegistryState>>,
    /// Called with the watched path when the last watch on it is cancelled,
    /// so hosts with OS backends can release the underlying OS watch.
    on_release: Option<Arc<dyn Fn(&NormalizedPath) + Send + Sync>>,
}

impl SharedWatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release_hook(hook: Arc<dyn Fn(&NormalizedPath) + Send + Sync>) -> Self {
        Self { state: Arc::default(), on_release: Some(hook) }
    }

    pub fn register_file(&self, path: NormalizedPath) -> WatcherHandle {
        self.register(WatchEntry { path, directory: false, recursive: false })
    }

    pub fn register_directory(&self, path: NormalizedPath, recursive: bool) -> WatcherHandle {
        self.register(WatchEntry { path, directory: true, recursive })
    }

    fn register(&self, entry: WatchEntry) -> WatcherHandle {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = WatchId(state.next_id);
        state.entries.insert(id, entry);
        WatcherHandle { id, registry: self.clone() }
    }

    fn cancel(&self, id: WatchId) {
        let released = {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.remove(&id) else {
                return;
            };
            let still_covered = state.entries.values().any(|other| other.path == entry.path);
            (!still_covered).then_some(entry.path)
        };
        if let (Some(path), Some(hook)) = (released, &self.on_release) {
            hook(&path);
        }
    }

    pub fn is_active(&self, id: WatchId) -> bool {
        self.state.lock().entries.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Paths of active non-directory watches, sorted. Test support.
    pub fn watched_file_paths(&self) -> Vec<NormalizedPath> {
        let state = self.state.lock();
        let mut paths: Vec<_> = state
            .entries
            .values()
            .filter(|entry| !entry.directory)
            .map(|entry| entry.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Route a filesystem-level change at `path` to every watch covering it:
    /// file watches on the exact path, directory watches on its parent, and
    /// recursive directory watches on any ancestor.
    pub fn notifications_for(
        &self,
        path: &NormalizedPath,
        kind: FileEventKind,
    ) -> Vec<WatchNotification> {
        let state = self.state.lock();
        let mut hits: Vec<(WatchId, WatchNotification)> = state
            .entries
            .iter()
            .filter(|(_, entry)| {
                if entry.directory {
                    if entry.recursive {
                        path != &entry.path && path.starts_with(&entry.path)
                    } else {
                        path.parent().is_some_and(|parent| parent == entry.path)
                    }
                } else {
                    path == &entry.path
                }
            })
            .map(|(id, _)| {
                (*id, WatchNotification { watch: *id, path: path.clone(), kind })
            })
            .collect();
        hits.sort_by_key(|(id, _)| *id);
        hits.into_iter().map(|(_, n)| n).collect()
    }
}

impl fmt::Debug for SharedWatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWatchRegistry")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

/// Owning handle for a registered watch. Dropping it cancels the watch.
#[derive(Debug)]
pub struct WatcherHandle {
    id: WatchId,
    registry: SharedWatchRegistry,
}

impl WatcherHandle {
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Explicit cancellation; equivalent to dropping the handle.
    pub fn close(self) {}
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}
