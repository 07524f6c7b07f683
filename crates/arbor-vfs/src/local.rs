use std::fs;
use std::io;
use std::path::Path;

use arbor_core::NormalizedPath;

use crate::host::ServerHost;
use crate::watch::{SharedWatchRegistry, WatcherHandle};

#[cfg(feature = "watch-notify")]
use crate::watch::WatchNotification;

/// Local OS filesystem host.
///
/// Watch registration always succeeds and is tracked in the registry; actual
/// OS delivery requires the `watch-notify` feature, which backs the registry
/// with a `notify` watcher and delivers [`WatchNotification`]s on a channel
/// the embedding event loop drains.
pub struct LocalHost {
    cwd: NormalizedPath,
    case_sensitive: bool,
    registry: SharedWatchRegistry,
    #[cfg(feature = "watch-notify")]
    backend: notify_backend::Backend,
}

impl LocalHost {
    pub fn new() -> io::Result<Self> {
        let cwd = std::env::current_dir()?;
        let cwd = NormalizedPath::new_absolute(&cwd.to_string_lossy());
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: NormalizedPath) -> Self {
        #[cfg(feature = "watch-notify")]
        {
            let (backend, registry) = notify_backend::Backend::start();
            Self { cwd, case_sensitive: default_case_sensitivity(), registry, backend }
        }
        #[cfg(not(feature = "watch-notify"))]
        {
            Self {
                cwd,
                case_sensitive: default_case_sensitivity(),
                registry: SharedWatchRegistry::new(),
            }
        }
    }

    /// Events produced by the OS watcher, for the embedding event loop.
    #[cfg(feature = "watch-notify")]
    pub fn watch_events(&self) -> &crossbeam_channel::Receiver<WatchNotification> {
        self.backend.receiver()
    }

    fn as_std_path(path: &NormalizedPath) -> &Path {
        Path::new(path.as_str())
    }
}

fn default_case_sensitivity() -> bool {
    !cfg!(any(target_os = "windows", target_os = "macos"))
}

impl ServerHost for LocalHost {
    fn file_exists(&self, path: &NormalizedPath) -> bool {
        Self::as_std_path(path).is_file()
    }

    fn read_file(&self, path: &NormalizedPath) -> io::Result<String> {
        fs::read_to_string(Self::as_std_path(path))
    }

    fn file_size(&self, path: &NormalizedPath) -> io::Result<u64> {
        fs::metadata(Self::as_std_path(path)).map(|meta| meta.len())
    }

    fn current_directory(&self) -> NormalizedPath {
        self.cwd.clone()
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        self.case_sensitive
    }

    fn watch_file(&self, path: &NormalizedPath) -> WatcherHandle {
        #[cfg(feature = "watch-notify")]
        self.backend.watch_os_path(path, false);
        self.registry.register_file(path.clone())
    }

    fn watch_directory(&self, path: &NormalizedPath, recursive: bool) -> WatcherHandle {
        #[cfg(feature = "watch-notify")]
        self.backend.watch_os_path(path, recursive);
        self.registry.register_directory(path.clone(), recursive)
    }
}

#[cfg(feature = "watch-notify")]
mod notify_backend {
    use std::path::Path;
    use std::sync::Arc;

    use arbor_core::NormalizedPath;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use notify::{RecommendedWatcher, RecursiveMode, Watcher};
    use parking_lot::Mutex;

    use crate::watch::{FileEventKind, SharedWatchRegistry, WatchNotification};

    pub(super) struct Backend {
        watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
        events: Receiver<WatchNotification>,
    }

    impl Backend {
        pub(super) fn start() -> (Self, SharedWatchRegistry) {
            let (tx, rx) = unbounded::<WatchNotification>();
            let watcher_slot: Arc<Mutex<Option<RecommendedWatcher>>> = Arc::new(Mutex::new(None));

            // The registry is created with a release hook so the OS watch is
            // dropped when the last logical watch on a path goes away.
            let registry = {
                let watcher_slot = Arc::clone(&watcher_slot);
                SharedWatchRegistry::with_release_hook(Arc::new(move |path: &NormalizedPath| {
                    if let Some(watcher) = watcher_slot.lock().as_mut() {
                        if let Err(err) = watcher.unwatch(Path::new(path.as_str())) {
                            tracing::debug!(path = %path, %err, "failed to release OS watch");
                        }
                    }
                }))
            };

            let routing_registry = registry.clone();
            let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                match res {
                    Ok(event) => route_event(&routing_registry, event, &tx),
                    Err(err) => tracing::warn!(%err, "file watcher error"),
                }
            });
            match watcher {
                Ok(watcher) => *watcher_slot.lock() = Some(watcher),
                Err(err) => tracing::warn!(%err, "failed to start OS file watcher"),
            }

            (Self { watcher: watcher_slot, events: rx }, registry)
        }

        pub(super) fn receiver(&self) -> &Receiver<WatchNotification> {
            &self.events
        }

        pub(super) fn watch_os_path(&self, path: &NormalizedPath, recursive: bool) {
            let mode = if recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            if let Some(watcher) = self.watcher.lock().as_mut() {
                if let Err(err) = watcher.watch(Path::new(path.as_str()), mode) {
                    tracing::debug!(path = %path, %err, "failed to register OS watch");
                }
            }
        }
    }

    fn route_event(
        registry: &SharedWatchRegistry,
        event: notify::Event,
        tx: &Sender<WatchNotification>,
    ) {
        let kind = match event.kind {
            notify::EventKind::Create(_) => FileEventKind::Created,
            notify::EventKind::Remove(_) => FileEventKind::Deleted,
            // Renames and metadata changes both surface as content hints;
            // consumers re-read from disk anyway.
            _ => FileEventKind::Changed,
        };
        for path in event.paths {
            let path = NormalizedPath::new_absolute(&path.to_string_lossy());
            for notification in registry.notifications_for(&path, kind) {
                let _ = tx.send(notification);
            }
        }
    }
}
