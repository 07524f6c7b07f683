use std::collections::{BTreeMap, HashSet};
use std::fmt;

use arbor_core::{
    CanonicalPath, CompilerOptions, ConfigDiagnostic, NormalizedPath, TypeAcquisition, WatchDepth,
};
use arbor_vfs::WatcherHandle;

/// Identity of a project across the whole coordinator.
///
/// The derived ordering doubles as the carrier-priority order: when a file
/// belongs to several projects, the minimum name wins (External beats
/// Configured beats Inferred).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProjectName {
    /// Opaque name supplied by the client.
    External(String),
    /// Canonical path of the configuration file.
    Configured(CanonicalPath),
    /// Generated id; stable for the life of the inferred project.
    Inferred(u64),
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectName::External(name) => write!(f, "{name}"),
            ProjectName::Configured(path) => write!(f, "{path}"),
            ProjectName::Inferred(id) => write!(f, "/dev/null/inferred-{id}"),
        }
    }
}

/// Variant-specific tail of a project.
#[derive(Debug)]
pub enum ProjectKind {
    /// Roots and options pushed verbatim by the client.
    External {
        /// Root files exactly as declared (post-safelist), in client order.
        declared_roots: Vec<NormalizedPath>,
    },
    /// Derived from an on-disk configuration file.
    Configured {
        config_file: NormalizedPath,
        /// Set when the config file changed on disk; the next graph update
        /// re-parses before building.
        pending_reload: bool,
        has_files_spec: bool,
        has_include_spec: bool,
        has_exclude_spec: bool,
        wildcard_directories: BTreeMap<NormalizedPath, WatchDepth>,
        diagnostics: Vec<ConfigDiagnostic>,
    },
    /// Synthesized to host orphan open files; never outlives its last root.
    Inferred,
}

/// A project: shared header plus a [`ProjectKind`] tail.
///
/// Root order is preserved (it is meaningful to the compiler); membership
/// checks go through a side set. Watcher handles registered for this project
/// are owned here and torn down with it.
#[derive(Debug)]
pub struct Project {
    name: ProjectName,
    pub options: CompilerOptions,
    pub compile_on_save: bool,
    pub type_acquisition: TypeAcquisition,
    language_service_enabled: bool,
    dirty: bool,
    /// Bumped on every root/options mutation; clients diff against it.
    version: u64,
    /// Bumped when the graph builder reports an actual change.
    graph_version: u64,
    roots: Vec<CanonicalPath>,
    root_set: HashSet<CanonicalPath>,
    /// Additional root files contributed by the typings installer.
    typing_roots: Vec<NormalizedPath>,
    /// Number of currently-open files this project contains. Meaningful for
    /// Configured/External; Inferred lifetime is root-driven instead.
    open_refs: u32,
    kind: ProjectKind,
    config_watcher: Option<WatcherHandle>,
    wildcard_watchers: Vec<WatcherHandle>,
    type_roots_watcher: Option<WatcherHandle>,
}

impl Project {
    pub fn new(name: ProjectName, options: CompilerOptions, kind: ProjectKind) -> Self {
        Self {
            name,
            options,
            compile_on_save: false,
            type_acquisition: TypeAcquisition::default(),
            language_service_enabled: true,
            dirty: true,
            version: 1,
            graph_version: 0,
            roots: Vec::new(),
            root_set: HashSet::new(),
            typing_roots: Vec::new(),
            open_refs: 0,
            kind,
            config_watcher: None,
            wildcard_watchers: Vec::new(),
            type_roots_watcher: None,
        }
    }

    pub fn name(&self) -> &ProjectName {
        &self.name
    }

    pub fn kind(&self) -> &ProjectKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ProjectKind {
        &mut self.kind
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self.kind, ProjectKind::Inferred)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.kind, ProjectKind::Configured { .. })
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, ProjectKind::External { .. })
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    pub fn roots(&self) -> &[CanonicalPath] {
        &self.roots
    }

    pub fn has_root(&self, path: &CanonicalPath) -> bool {
        self.root_set.contains(path)
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Append a root, preserving order. Returns false if already present.
    pub fn add_root(&mut self, path: CanonicalPath) -> bool {
        if !self.root_set.insert(path.clone()) {
            return false;
        }
        self.roots.push(path);
        self.mark_dirty();
        true
    }

    pub fn remove_root(&mut self, path: &CanonicalPath) -> bool {
        if !self.root_set.remove(path) {
            return false;
        }
        self.roots.retain(|root| root != path);
        self.mark_dirty();
        true
    }

    pub fn take_roots(&mut self) -> Vec<CanonicalPath> {
        self.root_set.clear();
        self.mark_dirty();
        std::mem::take(&mut self.roots)
    }

    /// An inferred project with no roots left is dead.
    pub fn is_rootless(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn typing_roots(&self) -> &[NormalizedPath] {
        &self.typing_roots
    }

    pub fn set_typing_roots(&mut self, typings: Vec<NormalizedPath>) {
        if self.typing_roots != typings {
            self.typing_roots = typings;
            self.mark_dirty();
        }
    }

    // ------------------------------------------------------------------
    // Dirtiness and versions
    // ------------------------------------------------------------------

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.version += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self, graph_changed: bool) {
        self.dirty = false;
        if graph_changed {
            self.graph_version += 1;
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn graph_version(&self) -> u64 {
        self.graph_version
    }

    // ------------------------------------------------------------------
    // Open references
    // ------------------------------------------------------------------

    pub fn open_refs(&self) -> u32 {
        self.open_refs
    }

    pub fn retain_open(&mut self) {
        self.open_refs += 1;
    }

    /// Returns true when the count dropped to zero.
    pub fn release_open(&mut self) -> bool {
        debug_assert!(self.open_refs > 0, "open-ref underflow on {}", self.name);
        self.open_refs = self.open_refs.saturating_sub(1);
        self.open_refs == 0
    }

    // ------------------------------------------------------------------
    // Language service state (driven by the size limit)
    // ------------------------------------------------------------------

    pub fn language_service_enabled(&self) -> bool {
        self.language_service_enabled
    }

    /// Returns true when the state actually changed.
    pub fn set_language_service_enabled(&mut self, enabled: bool) -> bool {
        if self.language_service_enabled == enabled {
            return false;
        }
        self.language_service_enabled = enabled;
        self.mark_dirty();
        true
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    pub fn set_config_watcher(&mut self, handle: WatcherHandle) -> Option<WatcherHandle> {
        self.config_watcher.replace(handle)
    }

    pub fn push_wildcard_watcher(&mut self, handle: WatcherHandle) {
        self.wildcard_watchers.push(handle);
    }

    pub fn set_type_roots_watcher(&mut self, handle: WatcherHandle) -> Option<WatcherHandle> {
        self.type_roots_watcher.replace(handle)
    }

    /// Detach the wildcard/type-root watchers (size-limit teardown), leaving
    /// the config watcher armed.
    pub fn take_analysis_watchers(&mut self) -> Vec<WatcherHandle> {
        let mut handles = std::mem::take(&mut self.wildcard_watchers);
        handles.extend(self.type_roots_watcher.take());
        handles
    }

    /// Detach every watcher this project owns (project teardown).
    pub fn take_all_watchers(&mut self) -> Vec<WatcherHandle> {
        let mut handles = self.take_analysis_watchers();
        handles.extend(self.config_watcher.take());
        handles
    }
}
