use std::collections::HashMap;

use arbor_core::{CanonicalPath, NormalizedPath, ScriptKind, TextChange};
use arbor_project::ProjectName;
use arbor_vfs::WatcherHandle;

/// One known file, open in the editor or watched on disk.
///
/// Scripts reference their containing projects with *non-owning* back
/// references: the project owns its root list, the script only knows which
/// projects currently claim it, so membership lookups never walk the whole
/// project table.
#[derive(Debug)]
pub struct ScriptInfo {
    path: NormalizedPath,
    canonical: CanonicalPath,
    kind: ScriptKind,
    has_mixed_content: bool,
    open: bool,
    /// Present only while open; closed files are read through the host.
    contents: Option<String>,
    /// Root bound for this file's upward config search, remembered from the
    /// open request so reload passes search the same range.
    open_project_root: Option<NormalizedPath>,
    containing: Vec<ProjectName>,
    watcher: Option<WatcherHandle>,
}

impl ScriptInfo {
    pub fn new(
        path: NormalizedPath,
        canonical: CanonicalPath,
        kind: ScriptKind,
        has_mixed_content: bool,
    ) -> Self {
        Self {
            path,
            canonical,
            kind,
            has_mixed_content,
            open: false,
            contents: None,
            open_project_root: None,
            containing: Vec::new(),
            watcher: None,
        }
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    pub fn canonical(&self) -> &CanonicalPath {
        &self.canonical
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn has_mixed_content(&self) -> bool {
        self.has_mixed_content
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }

    pub fn open_project_root(&self) -> Option<&NormalizedPath> {
        self.open_project_root.as_ref()
    }

    pub(crate) fn mark_open(&mut self, contents: String, project_root: Option<NormalizedPath>) {
        self.open = true;
        self.contents = Some(contents);
        self.open_project_root = project_root;
    }

    pub(crate) fn set_contents(&mut self, contents: String) {
        debug_assert!(self.open, "closed scripts do not hold contents");
        self.contents = Some(contents);
    }

    pub(crate) fn mark_closed(&mut self) {
        self.open = false;
        self.contents = None;
        self.open_project_root = None;
    }

    pub(crate) fn apply_changes(&mut self, changes: &[TextChange]) {
        let contents = self.contents.get_or_insert_with(String::new);
        TextChange::apply_all(contents, changes);
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    pub fn containing_projects(&self) -> &[ProjectName] {
        &self.containing
    }

    pub fn is_orphan(&self) -> bool {
        self.containing.is_empty()
    }

    /// The carrier project: External beats Configured beats Inferred.
    pub fn default_project(&self) -> Option<&ProjectName> {
        self.containing.iter().min()
    }

    pub(crate) fn attach(&mut self, project: ProjectName) {
        if !self.containing.contains(&project) {
            self.containing.push(project);
        }
    }

    pub(crate) fn detach(&mut self, project: &ProjectName) {
        self.containing.retain(|name| name != project);
    }

    // ------------------------------------------------------------------
    // Disk watcher
    // ------------------------------------------------------------------

    pub fn has_watcher(&self) -> bool {
        self.watcher.is_some()
    }

    pub(crate) fn set_watcher(&mut self, handle: WatcherHandle) {
        debug_assert!(!self.open, "open scripts are never watched: {}", self.path);
        debug_assert!(!self.has_mixed_content, "mixed-content scripts are never watched");
        self.watcher = Some(handle);
    }

    pub(crate) fn take_watcher(&mut self) -> Option<WatcherHandle> {
        self.watcher.take()
    }
}

/// Canonical store of every known script, keyed by canonical path.
#[derive(Debug, Default)]
pub(crate) struct ScriptRegistry {
    scripts: HashMap<CanonicalPath, ScriptInfo>,
}

impl ScriptRegistry {
    pub fn contains(&self, path: &CanonicalPath) -> bool {
        self.scripts.contains_key(path)
    }

    pub fn get(&self, path: &CanonicalPath) -> Option<&ScriptInfo> {
        self.scripts.get(path)
    }

    pub fn get_mut(&mut self, path: &CanonicalPath) -> Option<&mut ScriptInfo> {
        self.scripts.get_mut(path)
    }

    pub fn insert(&mut self, script: ScriptInfo) {
        self.scripts.insert(script.canonical().clone(), script);
    }

    pub fn remove(&mut self, path: &CanonicalPath) -> Option<ScriptInfo> {
        self.scripts.remove(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptInfo> {
        self.scripts.values()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }
}
