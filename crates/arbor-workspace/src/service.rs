use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arbor_core::{
    CanonicalPath, CompilerOptions, ConfigDiagnostic, FileExtensionInfo, FormatOptions,
    NormalizedPath, ScriptKind, TextChange, TypeAcquisition,
};
use arbor_project::{
    Project, ProjectKind, ProjectName, Safelist, SafelistError, SizeLimit, DEFAULT_SIZE_BUDGET,
};
use arbor_scheduler::{Debounce, DEFAULT_THROTTLE_DELAY};
use arbor_vfs::{FileEventKind, ServerHost, WatchId, WatchNotification};
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::{ConfigParser, JsonConfigParser};
use crate::events::{
    scrub_compiler_options, FileExtensionCounts, ProjectInfoTelemetry, ProjectTaxonomy,
    ServerEvent,
};
use crate::graph::{GraphBuilder, NoopGraphBuilder, ProjectGraphView};
use crate::presence::{ConfigFileEntry, ConfigPresence, PresenceState};
use crate::registry::{ScriptInfo, ScriptRegistry};
use crate::typings::{NoopTypingsInstaller, TypingsInstaller};

/// The recognized configuration filenames, probed in order at each level of
/// the upward search.
pub const CONFIG_FILE_NAMES: [&str; 2] = ["tsconfig.json", "jsconfig.json"];

fn is_config_file_name(name: &str) -> bool {
    CONFIG_FILE_NAMES.iter().any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Scheduler keys. The derived ordering drains per-project updates before
/// the inferred refresh within one tick.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TaskKey {
    Project(ProjectName),
    RefreshInferred,
}

/// Why a watch id was registered; consulted when its notification arrives.
#[derive(Debug, Clone)]
enum WatchPurpose {
    /// Disk watch on a closed script.
    ClosedScript(CanonicalPath),
    /// Presence-table watch on a config path no project has adopted.
    GhostConfig(CanonicalPath),
    /// A configured project's watch on its own config file.
    AdoptedConfig(CanonicalPath),
    /// A configured project's wildcard include directory.
    WildcardDirectory(ProjectName),
    /// A project's type-root directories.
    TypeRoots(ProjectName),
}

#[derive(Debug, Default)]
pub struct OpenFileResult {
    /// The configuration file the upward search resolved to, if any.
    pub config_file_name: Option<NormalizedPath>,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

/// One entry of a batched open request.
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    pub path: String,
    pub contents: Option<String>,
    pub script_kind: Option<ScriptKind>,
    pub project_root: Option<String>,
}

/// Edits against one open file, spans expressed against the pre-batch text.
#[derive(Debug, Clone)]
pub struct FileEdits {
    pub path: String,
    pub changes: Vec<TextChange>,
}

/// An externally declared project, pushed verbatim by the client.
#[derive(Debug, Clone, Default)]
pub struct ExternalProjectSpec {
    pub project_name: String,
    pub root_files: Vec<String>,
    pub options: CompilerOptions,
    pub type_acquisition: TypeAcquisition,
    pub compile_on_save: bool,
}

/// Client host-configuration update.
#[derive(Debug, Clone, Default)]
pub struct HostConfiguration {
    pub file: Option<String>,
    pub host_info: Option<String>,
    pub format_options: Option<FormatOptions>,
    pub extra_file_extensions: Option<Vec<FileExtensionInfo>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectVersionInfo {
    pub name: ProjectName,
    pub version: u64,
    pub roots: Vec<NormalizedPath>,
    pub options: CompilerOptions,
}

#[derive(Debug, Default, PartialEq)]
pub struct ProjectVersionDelta {
    pub changed: Vec<ProjectVersionInfo>,
    pub removed: Vec<ProjectName>,
}

#[derive(Debug, thiserror::Error)]
pub enum SafeListLoadError {
    #[error("failed to read safelist {path}: {source}")]
    Read {
        path: NormalizedPath,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] SafelistError),
}

#[derive(Debug, Clone)]
pub struct ProjectSetOptions {
    pub use_single_inferred_project: bool,
    pub size_budget: u64,
    pub throttle_delay: Duration,
}

impl Default for ProjectSetOptions {
    fn default() -> Self {
        Self {
            use_single_inferred_project: false,
            size_budget: DEFAULT_SIZE_BUDGET,
            throttle_delay: DEFAULT_THROTTLE_DELAY,
        }
    }
}

/// The project-set coordinator.
///
/// Owns every piece of shared state: the script registry, the project
/// collections, the config-presence table and the pending-update queue.
/// Only the coordinator mutates them, and only from the host's dispatcher
/// thread; there is no internal locking.
pub struct ProjectSet {
    host: Arc<dyn ServerHost>,
    config_parser: Box<dyn ConfigParser>,
    graph_builder: Box<dyn GraphBuilder>,
    typings: Box<dyn TypingsInstaller>,

    registry: ScriptRegistry,
    presence: ConfigPresence,
    projects: BTreeMap<ProjectName, Project>,
    /// External project name → sorted canonical config paths it adopted.
    external_to_configs: BTreeMap<String, Vec<CanonicalPath>>,
    open_files: Vec<CanonicalPath>,
    watches: HashMap<WatchId, WatchPurpose>,

    debounce: Debounce<TaskKey>,
    pending_projects: BTreeSet<ProjectName>,
    pending_inferred_refresh: bool,
    changed_files: Vec<CanonicalPath>,
    /// Closed, orphaned scripts awaiting the next open's garbage pass.
    pending_script_gc: Vec<CanonicalPath>,

    size_limit: SizeLimit,
    safelist: Safelist,
    inferred_options: CompilerOptions,
    use_single_inferred: bool,
    next_inferred_id: u64,

    host_info: Option<String>,
    global_format_options: FormatOptions,
    per_file_format_options: BTreeMap<CanonicalPath, FormatOptions>,
    extra_file_extensions: Vec<FileExtensionInfo>,

    events: Option<Sender<ServerEvent>>,
}

impl ProjectSet {
    pub fn new(host: Arc<dyn ServerHost>) -> Self {
        Self::with_options(host, ProjectSetOptions::default())
    }

    pub fn with_options(host: Arc<dyn ServerHost>, options: ProjectSetOptions) -> Self {
        Self {
            host,
            config_parser: Box::new(JsonConfigParser),
            graph_builder: Box::new(NoopGraphBuilder),
            typings: Box::new(NoopTypingsInstaller),
            registry: ScriptRegistry::default(),
            presence: ConfigPresence::default(),
            projects: BTreeMap::new(),
            external_to_configs: BTreeMap::new(),
            open_files: Vec::new(),
            watches: HashMap::new(),
            debounce: Debounce::new(options.throttle_delay),
            pending_projects: BTreeSet::new(),
            pending_inferred_refresh: false,
            changed_files: Vec::new(),
            pending_script_gc: Vec::new(),
            size_limit: SizeLimit::new(options.size_budget),
            safelist: Safelist::builtin(),
            inferred_options: CompilerOptions::default(),
            use_single_inferred: options.use_single_inferred_project,
            next_inferred_id: 0,
            host_info: None,
            global_format_options: FormatOptions::default(),
            per_file_format_options: BTreeMap::new(),
            extra_file_extensions: Vec::new(),
            events: None,
        }
    }

    pub fn set_config_parser(&mut self, parser: Box<dyn ConfigParser>) {
        self.config_parser = parser;
    }

    pub fn set_graph_builder(&mut self, builder: Box<dyn GraphBuilder>) {
        self.graph_builder = builder;
    }

    pub fn set_typings_installer(&mut self, installer: Box<dyn TypingsInstaller>) {
        self.typings = installer;
    }

    /// Attach the single event handler. Events emitted before a subscriber
    /// exists are dropped.
    pub fn subscribe(&mut self) -> Receiver<ServerEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    // ==================================================================
    // Open / close / change ingress
    // ==================================================================

    /// Open a file on behalf of the client.
    ///
    /// Runs the full reconciliation: carrier lookup, upward config search,
    /// configured-project creation, inferred rebalancing, and the deferred
    /// garbage pass.
    pub fn open_client_file(
        &mut self,
        path: &str,
        contents: Option<String>,
        script_kind: Option<ScriptKind>,
        project_root: Option<&str>,
    ) -> OpenFileResult {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        let bound = project_root.map(|root| self.normalize(root));

        self.ensure_script(&norm, script_kind);
        let was_open = self.registry.get(&canon).is_some_and(ScriptInfo::is_open);
        if !was_open {
            let text = match contents {
                Some(text) => text,
                None => self.host.read_file(&norm).unwrap_or_else(|err| {
                    tracing::warn!(path = %norm, %err, "failed to read opened file");
                    String::new()
                }),
            };
            let script = self.registry.get_mut(&canon).expect("script was just ensured");
            script.mark_open(text, bound.clone());
            if let Some(handle) = script.take_watcher() {
                self.watches.remove(&handle.id());
            }
            // Open-ref bookkeeping for the projects that already contained
            // this file; projects that adopt it later count it at attach.
            let members: Vec<ProjectName> = script.containing_projects().to_vec();
            for name in members {
                if let Some(project) = self.projects.get_mut(&name) {
                    if !project.is_inferred() {
                        project.retain_open();
                    }
                }
            }
            self.open_files.push(canon.clone());
        } else if let Some(text) = contents {
            // Duplicate opens are idempotent but refresh supplied contents.
            self.registry.get_mut(&canon).expect("open script exists").set_contents(text);
        }

        let mut result = OpenFileResult::default();

        let carried_by_external =
            self.projects.values().any(|p| p.is_external() && p.has_root(&canon));
        if !carried_by_external {
            if let Some(config) = self.upward_config_search(&canon, &norm, bound.as_ref()) {
                let (_, diagnostics) = self.find_or_create_configured(&config, Some(&norm));
                result.config_file_name = Some(config);
                result.diagnostics = diagnostics;
            }
        }

        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();
        self.collect_garbage();

        result
    }

    /// Close a file. Closing an unknown or already-closed file is a no-op.
    pub fn close_client_file(&mut self, path: &str) {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        let Some(script) = self.registry.get_mut(&canon) else {
            return;
        };
        if !script.is_open() {
            return;
        }

        script.mark_closed();
        let mixed = script.has_mixed_content();
        let members: Vec<ProjectName> = script.containing_projects().to_vec();
        if !mixed {
            let handle = self.host.watch_file(&norm);
            self.watches.insert(handle.id(), WatchPurpose::ClosedScript(canon.clone()));
            self.registry
                .get_mut(&canon)
                .expect("script still registered")
                .set_watcher(handle);
        }
        self.open_files.retain(|open| open != &canon);

        let mut removals: Vec<ProjectName> = Vec::new();
        for name in members {
            let Some(project) = self.projects.get_mut(&name) else { continue };
            if project.is_inferred() {
                if project.root_count() == 1 && project.has_root(&canon) {
                    removals.push(name);
                } else {
                    self.detach_script(&canon, &name);
                }
            } else if project.release_open() {
                removals.push(name);
            }
        }
        for name in &removals {
            self.remove_project(name);
        }

        // This file no longer tracks any config path; entries it orphaned
        // transition per the watcher state machine.
        self.untrack_script(&canon);

        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();

        if self
            .registry
            .get(&canon)
            .is_some_and(|script| !script.is_open() && script.is_orphan())
        {
            self.pending_script_gc.push(canon);
        }
    }

    /// Apply a client batch: opens first, then edits, then closes.
    ///
    /// Edits within one file are applied in reverse order so earlier spans
    /// keep their coordinates. Editing a file the client never opened is a
    /// protocol violation and asserts.
    pub fn apply_changes_in_open_files(
        &mut self,
        opens: Vec<OpenRequest>,
        changes: Vec<FileEdits>,
        closes: Vec<String>,
    ) {
        let force_reconcile = !opens.is_empty() || !closes.is_empty();
        for open in opens {
            self.open_client_file(
                &open.path,
                open.contents,
                open.script_kind,
                open.project_root.as_deref(),
            );
        }
        for edit in changes {
            self.apply_edits(&edit.path, &edit.changes);
        }
        for path in closes {
            self.close_client_file(&path);
        }
        if force_reconcile {
            self.assign_orphans_to_inferred();
            self.prune_redundant_inferred();
        }
    }

    fn apply_edits(&mut self, path: &str, changes: &[TextChange]) {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        let Some(script) = self.registry.get_mut(&canon) else {
            panic!("received edits for unknown file: {norm}");
        };
        assert!(script.is_open(), "received edits for a file the client never opened: {norm}");
        if changes.is_empty() {
            return;
        }
        script.apply_changes(changes);
        let members: Vec<ProjectName> = script.containing_projects().to_vec();
        if !self.changed_files.contains(&canon) {
            self.changed_files.push(canon);
        }
        for name in members {
            if let Some(project) = self.projects.get_mut(&name) {
                project.mark_dirty();
            }
            self.schedule_project_update(name);
        }
    }

    // ==================================================================
    // Watch ingress
    // ==================================================================

    /// Dispatch one filesystem notification by the purpose its watch id was
    /// registered under. Notifications for unknown ids are logged and
    /// ignored (the owner tore the watch down while the event was in
    /// flight).
    pub fn handle_watch_event(&mut self, notification: &WatchNotification) {
        let Some(purpose) = self.watches.get(&notification.watch).cloned() else {
            tracing::debug!(path = %notification.path, "notification for unknown watch id");
            return;
        };
        match purpose {
            WatchPurpose::ClosedScript(canon) => {
                self.on_script_disk_event(&canon, notification.kind)
            }
            WatchPurpose::GhostConfig(canon) => {
                self.on_ghost_config_event(&canon, notification.kind)
            }
            WatchPurpose::AdoptedConfig(canon) => {
                self.on_adopted_config_event(&canon, notification.kind)
            }
            WatchPurpose::WildcardDirectory(name) => self.on_project_inputs_event(&name),
            WatchPurpose::TypeRoots(name) => self.on_type_roots_event(&name),
        }
    }

    fn on_script_disk_event(&mut self, canon: &CanonicalPath, kind: FileEventKind) {
        match kind {
            FileEventKind::Deleted => {
                // Stale event: the script was reopened while the delete was
                // in flight and the client now owns it.
                if self.registry.get(canon).is_some_and(ScriptInfo::is_open) {
                    return;
                }
                let Some(mut script) = self.registry.remove(canon) else { return };
                if let Some(handle) = script.take_watcher() {
                    self.watches.remove(&handle.id());
                }
                // Copy the membership set first: detaching mutates it.
                let members: Vec<ProjectName> = script.containing_projects().to_vec();
                for name in members {
                    if let Some(project) = self.projects.get_mut(&name) {
                        project.remove_root(canon);
                    }
                    self.schedule_project_update(name);
                }
                // TODO(upstream parity): a delete racing an open buffer does
                // not re-emit context events for the still-open editor.
            }
            FileEventKind::Created | FileEventKind::Changed => {
                let Some(script) = self.registry.get(canon) else { return };
                if script.is_open() {
                    // The client owns the content of open files.
                    return;
                }
                if script.is_orphan() {
                    let mut script = self.registry.remove(canon).expect("just looked up");
                    if let Some(handle) = script.take_watcher() {
                        self.watches.remove(&handle.id());
                    }
                    return;
                }
                // Closed members reload through the host at the next graph
                // build; just mark and schedule.
                let members: Vec<ProjectName> = script.containing_projects().to_vec();
                if !self.changed_files.contains(canon) {
                    self.changed_files.push(canon.clone());
                }
                for name in members {
                    if let Some(project) = self.projects.get_mut(&name) {
                        project.mark_dirty();
                    }
                    self.schedule_project_update(name);
                }
            }
        }
    }

    fn on_ghost_config_event(&mut self, canon: &CanonicalPath, kind: FileEventKind) {
        let Some(entry) = self.presence.get_mut(canon) else { return };
        entry.exists = kind != FileEventKind::Deleted;
        // The upward search of every tracking open file may now resolve
        // differently; run the reload pass over all of them.
        let trackers = entry.tracker_scripts();
        self.reload_open_files(&trackers);
    }

    fn on_adopted_config_event(&mut self, canon: &CanonicalPath, kind: FileEventKind) {
        let name = ProjectName::Configured(canon.clone());
        match kind {
            FileEventKind::Deleted => {
                if let Some(entry) = self.presence.get_mut(canon) {
                    entry.exists = false;
                }
                let mut affected: Vec<CanonicalPath> = self
                    .presence
                    .get(canon)
                    .map(ConfigFileEntry::tracker_scripts)
                    .unwrap_or_default();
                if let Some(project) = self.projects.get(&name) {
                    for root in project.roots() {
                        if self.registry.get(root).is_some_and(ScriptInfo::is_open)
                            && !affected.contains(root)
                        {
                            affected.push(root.clone());
                        }
                    }
                }
                self.remove_project(&name);
                self.reload_open_files(&affected);
            }
            FileEventKind::Created | FileEventKind::Changed => {
                if let Some(entry) = self.presence.get_mut(canon) {
                    entry.exists = true;
                }
                if let Some(project) = self.projects.get_mut(&name) {
                    if let ProjectKind::Configured { pending_reload, .. } = project.kind_mut() {
                        *pending_reload = true;
                    }
                    project.mark_dirty();
                    self.schedule_project_update(name);
                }
            }
        }
    }

    fn on_project_inputs_event(&mut self, name: &ProjectName) {
        let Some(project) = self.projects.get_mut(name) else { return };
        if let ProjectKind::Configured { pending_reload, .. } = project.kind_mut() {
            *pending_reload = true;
        }
        project.mark_dirty();
        self.schedule_project_update(name.clone());
    }

    fn on_type_roots_event(&mut self, name: &ProjectName) {
        let Some(project) = self.projects.get_mut(name) else { return };
        project.mark_dirty();
        self.typings.invalidate(name);
        self.schedule_project_update(name.clone());
    }

    // ==================================================================
    // External projects
    // ==================================================================

    pub fn open_external_project(&mut self, spec: ExternalProjectSpec) {
        self.open_external_project_inner(spec);
        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();
        self.collect_garbage();
    }

    /// Atomic delta against the whole external set: projects absent from
    /// `specs` are closed, the rest are opened or updated.
    pub fn open_external_projects(&mut self, specs: Vec<ExternalProjectSpec>) {
        let incoming: HashSet<&str> = specs.iter().map(|s| s.project_name.as_str()).collect();
        let known: Vec<String> = self
            .projects
            .keys()
            .filter_map(|name| match name {
                ProjectName::External(name) => Some(name.clone()),
                _ => None,
            })
            .chain(self.external_to_configs.keys().cloned())
            .collect();
        for name in known {
            if !incoming.contains(name.as_str()) {
                self.close_external_project(&name);
            }
        }
        for spec in specs {
            self.open_external_project(spec);
        }
    }

    pub fn close_external_project(&mut self, name: &str) {
        if let Some(configs) = self.external_to_configs.remove(name) {
            for config in configs {
                self.release_adopted_config(&config);
            }
        }
        let external = ProjectName::External(name.to_string());
        if self.projects.contains_key(&external) {
            self.remove_project(&external);
        }
        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();
        self.collect_garbage();
    }

    fn open_external_project_inner(&mut self, spec: ExternalProjectSpec) {
        let mut file_roots: Vec<NormalizedPath> = Vec::new();
        let mut config_roots: Vec<NormalizedPath> = Vec::new();
        for raw in &spec.root_files {
            let norm = self.normalize(raw);
            if is_config_file_name(norm.file_name()) {
                config_roots.push(norm);
            } else {
                file_roots.push(norm);
            }
        }

        // Safelisted third-party bundles drop out of the declaration and
        // contribute typings instead.
        let outcome = self.safelist.apply(&mut file_roots);
        let mut type_acquisition = spec.type_acquisition.clone();
        for typing in outcome.typings {
            if !type_acquisition.include.contains(&typing) {
                type_acquisition.include.push(typing);
            }
        }

        let external = ProjectName::External(spec.project_name.clone());

        if !config_roots.is_empty() {
            // The declaration adopts config files: those live as Configured
            // projects held by this external's reference; no External
            // project object exists.
            let mut adopted: Vec<CanonicalPath> =
                config_roots.iter().map(|config| self.canon(config)).collect();
            adopted.sort();
            adopted.dedup();
            let previous =
                self.external_to_configs.insert(spec.project_name.clone(), adopted.clone());
            for config in &config_roots {
                self.find_or_create_configured(config, None);
            }
            if let Some(previous) = previous {
                for config in previous {
                    if !adopted.contains(&config) {
                        self.release_adopted_config(&config);
                    }
                }
            }
            if self.projects.contains_key(&external) {
                self.remove_project(&external);
            }
            return;
        }

        // Plain file-root declaration: any previously adopted configs are
        // released.
        if let Some(previous) = self.external_to_configs.remove(&spec.project_name) {
            for config in previous {
                self.release_adopted_config(&config);
            }
        }

        let created = !self.projects.contains_key(&external);
        if created {
            let project = Project::new(
                external.clone(),
                spec.options.clone(),
                ProjectKind::External { declared_roots: file_roots.clone() },
            );
            self.projects.insert(external.clone(), project);
        }
        {
            let project = self.projects.get_mut(&external).expect("just ensured");
            project.options = spec.options;
            project.compile_on_save = spec.compile_on_save;
            project.type_acquisition = type_acquisition.clone();
            if let ProjectKind::External { declared_roots } = project.kind_mut() {
                *declared_roots = file_roots.clone();
            }
        }

        let skip_size_gate = self
            .projects
            .get(&external)
            .is_some_and(|p| p.options.disable_size_limit == Some(true));
        let admitted = skip_size_gate
            || self.size_limit.admit(&external, &file_roots, self.host.as_ref());
        if let Some(project) = self.projects.get_mut(&external) {
            for handle in project.take_analysis_watchers() {
                self.watches.remove(&handle.id());
            }
        }
        self.apply_language_service_state(&external, admitted);
        if admitted {
            self.arm_analysis_watchers(&external);
        }

        // Diff roots against the declaration.
        let new_roots: Vec<CanonicalPath> = file_roots
            .iter()
            .map(|file| {
                self.ensure_script(file, None);
                self.canon(file)
            })
            .collect();
        let new_set: HashSet<&CanonicalPath> = new_roots.iter().collect();
        let old_roots: Vec<CanonicalPath> =
            self.projects.get(&external).expect("present").roots().to_vec();
        for old in &old_roots {
            if !new_set.contains(old) {
                self.detach_script(old, &external);
            }
        }
        for root in &new_roots {
            self.attach_script(root, &external);
        }

        if created {
            self.emit_project_telemetry(&external, ProjectTaxonomy::External);
        }
        if type_acquisition.enable == Some(true) {
            self.typings.enqueue_install(&external, &type_acquisition, &[]);
        }
        self.schedule_project_update(external);
    }

    /// Drop one external reference to an adopted config; the Configured
    /// project survives while any other external or any open file holds it.
    fn release_adopted_config(&mut self, config: &CanonicalPath) {
        let still_adopted =
            self.external_to_configs.values().any(|configs| configs.contains(config));
        if still_adopted {
            return;
        }
        let name = ProjectName::Configured(config.clone());
        if self.projects.get(&name).is_some_and(|p| p.open_refs() == 0) {
            self.remove_project(&name);
        }
    }

    // ==================================================================
    // Config search, presence table, configured projects
    // ==================================================================

    /// Walk from the file's directory toward the filesystem root (bounded
    /// above by `bound` when given), probing both recognized config
    /// filenames at each level. Every probe is recorded in the presence
    /// table; the first existing path wins.
    fn upward_config_search(
        &mut self,
        script: &CanonicalPath,
        file: &NormalizedPath,
        bound: Option<&NormalizedPath>,
    ) -> Option<NormalizedPath> {
        let mut dir = file.parent()?;
        loop {
            for name in CONFIG_FILE_NAMES {
                let probe = dir.join(name);
                if self.track_config_probe(&probe, script, false) {
                    return Some(probe);
                }
            }
            if bound.is_some_and(|bound| &dir == bound) {
                return None;
            }
            dir = dir.parent()?;
        }
    }

    /// Record `script` as a tracker of `config`, creating the presence entry
    /// (with existence read from the host) on first probe. Returns whether
    /// the config file exists.
    fn track_config_probe(
        &mut self,
        config: &NormalizedPath,
        script: &CanonicalPath,
        is_root: bool,
    ) -> bool {
        let canon = self.canon(config);
        let host = Arc::clone(&self.host);
        let entry = self.presence.entry_or_insert_with(canon.clone(), || {
            ConfigFileEntry::new(config.clone(), host.file_exists(config))
        });
        entry.track(script.clone(), is_root);
        let exists = entry.exists;
        self.sync_config_watch(&canon);
        exists
    }

    /// Reconcile one presence entry's watcher with the state machine: armed
    /// iff no configured project adopted the path and at least one tracker
    /// is an inferred root.
    fn sync_config_watch(&mut self, canon: &CanonicalPath) {
        let adopted = self.projects.contains_key(&ProjectName::Configured(canon.clone()));
        let Some(entry) = self.presence.get_mut(canon) else { return };
        let wanted = !adopted && entry.has_root_tracker();
        if wanted && !entry.has_watcher() {
            let handle = self.host.watch_file(entry.path());
            self.watches.insert(handle.id(), WatchPurpose::GhostConfig(canon.clone()));
            entry.set_watcher(handle);
        } else if !wanted {
            if let Some(handle) = entry.take_watcher() {
                self.watches.remove(&handle.id());
            }
        }
    }

    /// Remove `script` from every presence entry; entries left with no
    /// trackers and no project disappear.
    fn untrack_script(&mut self, script: &CanonicalPath) {
        for canon in self.presence.paths_tracking(script) {
            let adopted = self.projects.contains_key(&ProjectName::Configured(canon.clone()));
            let (now_empty, stale_watch) = {
                let Some(entry) = self.presence.get_mut(&canon) else { continue };
                entry.untrack(script);
                let now_empty = entry.is_untracked();
                let stale_watch =
                    if now_empty && !adopted { entry.take_watcher() } else { None };
                (now_empty, stale_watch)
            };
            if let Some(handle) = stale_watch {
                self.watches.remove(&handle.id());
            }
            if now_empty && !adopted {
                self.presence.remove(&canon);
            } else {
                self.sync_config_watch(&canon);
            }
        }
    }

    /// Flip the inferred-root flag of `script` in every entry tracking it
    /// and re-run the watcher state machine on each.
    fn set_inferred_root_tracking(&mut self, script: &CanonicalPath, is_root: bool) {
        for canon in self.presence.paths_tracking(script) {
            if let Some(entry) = self.presence.get_mut(&canon) {
                entry.set_root(script, is_root);
            }
            self.sync_config_watch(&canon);
        }
    }

    fn find_or_create_configured(
        &mut self,
        config: &NormalizedPath,
        trigger: Option<&NormalizedPath>,
    ) -> (ProjectName, Vec<ConfigDiagnostic>) {
        let canon = self.canon(config);
        let name = ProjectName::Configured(canon.clone());
        if let Some(project) = self.projects.get(&name) {
            let diagnostics = match project.kind() {
                ProjectKind::Configured { diagnostics, .. } => diagnostics.clone(),
                _ => Vec::new(),
            };
            return (name, diagnostics);
        }

        let (parsed, read_error) = match self.host.read_file(config) {
            Ok(text) => (self.config_parser.parse(&text, config), None),
            Err(err) => (
                arbor_core::ParsedConfig::default(),
                Some(ConfigDiagnostic::error(
                    arbor_core::CODE_NO_INPUTS,
                    format!("failed to read {config}: {err}"),
                )),
            ),
        };
        let mut diagnostics = parsed.diagnostics.clone();
        diagnostics.extend(read_error);

        let mut project = Project::new(
            name.clone(),
            parsed.options.clone(),
            ProjectKind::Configured {
                config_file: config.clone(),
                pending_reload: false,
                has_files_spec: parsed.has_files_spec,
                has_include_spec: parsed.has_include_spec,
                has_exclude_spec: parsed.has_exclude_spec,
                wildcard_directories: parsed.wildcard_directories.clone(),
                diagnostics: diagnostics.clone(),
            },
        );
        project.compile_on_save = parsed.compile_on_save;
        project.type_acquisition = parsed.type_acquisition.clone();
        self.projects.insert(name.clone(), project);

        let admitted = parsed.options.disable_size_limit == Some(true)
            || self.size_limit.admit(&name, &parsed.file_names, self.host.as_ref());
        self.apply_language_service_state(&name, admitted);

        for file in &parsed.file_names {
            self.ensure_script(file, None);
            let root = self.canon(file);
            self.attach_script(&root, &name);
        }

        // The project's own watch on its config file.
        let handle = self.host.watch_file(config);
        self.watches.insert(handle.id(), WatchPurpose::AdoptedConfig(canon.clone()));
        self.projects.get_mut(&name).expect("just inserted").set_config_watcher(handle);
        if admitted {
            self.arm_analysis_watchers(&name);
        }

        // Presence transition to Adopted: existence is definitive, any
        // ghost watcher comes down.
        let entry = self.presence.entry_or_insert_with(canon.clone(), || {
            ConfigFileEntry::new(config.clone(), true)
        });
        entry.exists = true;
        if let Some(stale) = entry.take_watcher() {
            self.watches.remove(&stale.id());
        }

        self.run_graph_update(&name);

        self.emit(ServerEvent::ConfigFileDiagnostics {
            trigger_file: trigger.cloned().unwrap_or_else(|| config.clone()),
            config_file: config.clone(),
            diagnostics: diagnostics.clone(),
        });
        self.emit_project_telemetry(&name, ProjectTaxonomy::Configured);
        if parsed.type_acquisition.enable == Some(true) {
            self.typings.enqueue_install(&name, &parsed.type_acquisition, &[]);
        }

        (name, diagnostics)
    }

    /// Re-parse a configured project whose config changed on disk. Runs as
    /// the first step of its next graph update.
    fn reload_configured(&mut self, name: &ProjectName) {
        let Some(project) = self.projects.get(name) else { return };
        let ProjectKind::Configured { config_file, .. } = project.kind() else { return };
        let config = config_file.clone();

        if !self.host.file_exists(&config) {
            // The delete event normally handles this; a reload racing one
            // degrades to the same removal.
            let canon = self.canon(&config);
            self.on_adopted_config_event(&canon, FileEventKind::Deleted);
            return;
        }

        let parsed = match self.host.read_file(&config) {
            Ok(text) => self.config_parser.parse(&text, &config),
            Err(err) => {
                tracing::warn!(path = %config, %err, "failed to re-read config file");
                return;
            }
        };

        {
            let project = self.projects.get_mut(name).expect("checked above");
            project.options = parsed.options.clone();
            project.compile_on_save = parsed.compile_on_save;
            project.type_acquisition = parsed.type_acquisition.clone();
            if let ProjectKind::Configured {
                pending_reload,
                has_files_spec,
                has_include_spec,
                has_exclude_spec,
                wildcard_directories,
                diagnostics,
                ..
            } = project.kind_mut()
            {
                *pending_reload = false;
                *has_files_spec = parsed.has_files_spec;
                *has_include_spec = parsed.has_include_spec;
                *has_exclude_spec = parsed.has_exclude_spec;
                *wildcard_directories = parsed.wildcard_directories.clone();
                *diagnostics = parsed.diagnostics.clone();
            }
            project.mark_dirty();
        }

        let admitted = parsed.options.disable_size_limit == Some(true)
            || self.size_limit.admit(name, &parsed.file_names, self.host.as_ref());
        // The wildcard set may have moved; rebuild the analysis watchers
        // from scratch either way.
        if let Some(project) = self.projects.get_mut(name) {
            for handle in project.take_analysis_watchers() {
                self.watches.remove(&handle.id());
            }
        }
        self.apply_language_service_state(name, admitted);
        if admitted {
            self.arm_analysis_watchers(name);
        }

        let new_roots: Vec<CanonicalPath> = parsed
            .file_names
            .iter()
            .map(|file| {
                self.ensure_script(file, None);
                self.canon(file)
            })
            .collect();
        let new_set: HashSet<&CanonicalPath> = new_roots.iter().collect();
        let old_roots: Vec<CanonicalPath> =
            self.projects.get(name).expect("present").roots().to_vec();
        for old in &old_roots {
            if !new_set.contains(old) {
                self.detach_script(old, name);
            }
        }
        for root in &new_roots {
            self.attach_script(root, name);
        }

        self.emit(ServerEvent::ConfigFileDiagnostics {
            trigger_file: config.clone(),
            config_file: config,
            diagnostics: parsed.diagnostics,
        });
        if parsed.type_acquisition.enable == Some(true) {
            let acquisition = parsed.type_acquisition.clone();
            self.typings.enqueue_install(name, &acquisition, &[]);
        }

        // Files the reload orphaned get re-homed at the pending inferred
        // refresh; the bit is already set because this project was pending.
    }

    /// Record the size-limit verdict. Tears down the analysis watchers on
    /// refusal; callers re-arm them on admission (the wildcard set may have
    /// changed, so arming is theirs).
    fn apply_language_service_state(&mut self, name: &ProjectName, enabled: bool) {
        let Some(project) = self.projects.get_mut(name) else { return };
        let changed = project.set_language_service_enabled(enabled);
        if !enabled {
            for handle in project.take_analysis_watchers() {
                self.watches.remove(&handle.id());
            }
        }
        if changed {
            self.emit(ServerEvent::LanguageServiceState { project: name.clone(), enabled });
        }
    }

    /// Wildcard-directory and type-root watches; only present while the
    /// language service is enabled.
    fn arm_analysis_watchers(&mut self, name: &ProjectName) {
        let Some(project) = self.projects.get(name) else { return };
        let mut directories: Vec<(NormalizedPath, bool)> = Vec::new();
        if let ProjectKind::Configured { wildcard_directories, config_file, .. } = project.kind() {
            for (dir, depth) in wildcard_directories {
                directories.push((dir.clone(), *depth == arbor_core::WatchDepth::Recursive));
            }
            // Default type root next to the config.
            if project.options.type_roots.is_none() {
                if let Some(config_dir) = config_file.parent() {
                    let types_dir =
                        config_dir.join("node_modules").join("@types");
                    directories.push((types_dir, true));
                }
            }
        }
        let cwd = self.host.current_directory();
        if let Some(type_roots) = &project.options.type_roots {
            for root in type_roots {
                directories.push((NormalizedPath::new(root, &cwd), true));
            }
        }

        let mut handles = Vec::with_capacity(directories.len());
        for (dir, recursive) in directories {
            let is_type_root = dir.as_str().ends_with("@types")
                || project.options.type_roots.as_ref().is_some_and(|roots| {
                    roots.iter().any(|root| NormalizedPath::new(root, &cwd) == dir)
                });
            let handle = self.host.watch_directory(&dir, recursive);
            let purpose = if is_type_root {
                WatchPurpose::TypeRoots(name.clone())
            } else {
                WatchPurpose::WildcardDirectory(name.clone())
            };
            self.watches.insert(handle.id(), purpose);
            handles.push((handle, is_type_root));
        }

        let project = self.projects.get_mut(name).expect("checked above");
        for (handle, is_type_root) in handles {
            if is_type_root {
                if let Some(previous) = project.set_type_roots_watcher(handle) {
                    self.watches.remove(&previous.id());
                }
            } else {
                project.push_wildcard_watcher(handle);
            }
        }
    }

    // ==================================================================
    // Membership plumbing
    // ==================================================================

    fn classify(&self, file_name: &str, requested: Option<ScriptKind>) -> (ScriptKind, bool) {
        if let Some(kind) = requested {
            return (kind, kind == ScriptKind::External);
        }
        let lower = file_name.to_lowercase();
        for info in &self.extra_file_extensions {
            if lower.ends_with(&info.extension.to_lowercase()) {
                let kind = info.script_kind.unwrap_or(ScriptKind::Unknown);
                return (kind, info.is_mixed_content);
            }
        }
        (ScriptKind::from_file_name(file_name), false)
    }

    /// Obtain-or-create the script for `path`. Newly created scripts are
    /// closed, and closed non-mixed scripts get a disk watcher immediately.
    fn ensure_script(&mut self, path: &NormalizedPath, kind: Option<ScriptKind>) {
        let canon = self.canon(path);
        if self.registry.contains(&canon) {
            return;
        }
        let (script_kind, mixed) = self.classify(path.file_name(), kind);
        let mut script = ScriptInfo::new(path.clone(), canon.clone(), script_kind, mixed);
        if !mixed {
            let handle = self.host.watch_file(path);
            self.watches.insert(handle.id(), WatchPurpose::ClosedScript(canon));
            script.set_watcher(handle);
        }
        self.registry.insert(script);
    }

    fn attach_script(&mut self, canon: &CanonicalPath, name: &ProjectName) {
        let Some(project) = self.projects.get_mut(name) else { return };
        if !project.add_root(canon.clone()) {
            return;
        }
        if let Some(script) = self.registry.get_mut(canon) {
            script.attach(name.clone());
            if script.is_open() && !project.is_inferred() {
                project.retain_open();
            }
        }
    }

    fn detach_script(&mut self, canon: &CanonicalPath, name: &ProjectName) {
        let Some(project) = self.projects.get_mut(name) else { return };
        if !project.remove_root(canon) {
            return;
        }
        if let Some(script) = self.registry.get_mut(canon) {
            script.detach(name);
            if script.is_open() && !project.is_inferred() {
                project.release_open();
            }
            if !script.is_open() && script.is_orphan() {
                self.pending_script_gc.push(canon.clone());
            }
        }
    }

    fn remove_project(&mut self, name: &ProjectName) {
        let Some(mut project) = self.projects.remove(name) else { return };
        for handle in project.take_all_watchers() {
            self.watches.remove(&handle.id());
        }
        for root in project.take_roots() {
            if let Some(script) = self.registry.get_mut(&root) {
                script.detach(name);
                if !script.is_open() && script.is_orphan() {
                    self.pending_script_gc.push(root);
                }
            }
        }
        self.size_limit.forget(name);
        self.pending_projects.remove(name);
        self.debounce.cancel(&TaskKey::Project(name.clone()));

        if let ProjectName::Configured(canon) = name {
            // Unadopted now: the presence entry either re-arms its ghost
            // watcher (root trackers remain) or disappears (none remain).
            let drop_entry =
                self.presence.get(canon).is_some_and(ConfigFileEntry::is_untracked);
            if drop_entry {
                if let Some(mut entry) = self.presence.remove(canon) {
                    if let Some(handle) = entry.take_watcher() {
                        self.watches.remove(&handle.id());
                    }
                }
            } else {
                self.sync_config_watch(canon);
            }
        }
    }

    // ==================================================================
    // Inferred rebalancing
    // ==================================================================

    fn next_inferred_name(&mut self) -> ProjectName {
        if self.use_single_inferred {
            if let Some(existing) = self
                .projects
                .values()
                .find(|p| p.is_inferred())
                .map(|p| p.name().clone())
            {
                return existing;
            }
        }
        let id = self.next_inferred_id;
        self.next_inferred_id += 1;
        ProjectName::Inferred(id)
    }

    /// Give every orphaned open file an inferred project (or extend the
    /// single shared one) and build its graph eagerly.
    fn assign_orphans_to_inferred(&mut self) {
        let open = self.open_files.clone();
        for canon in open {
            let orphan = self.registry.get(&canon).is_some_and(ScriptInfo::is_orphan);
            if !orphan {
                continue;
            }
            let name = self.next_inferred_name();
            if !self.projects.contains_key(&name) {
                let project = Project::new(
                    name.clone(),
                    self.inferred_options.clone(),
                    ProjectKind::Inferred,
                );
                self.projects.insert(name.clone(), project);
            }
            self.attach_script(&canon, &name);
            self.set_inferred_root_tracking(&canon, true);
            self.run_graph_update(&name);
        }
    }

    /// Inferred projects are the lowest-priority carrier: any root that also
    /// belongs to another project leaves, and a rootless inferred project is
    /// removed.
    fn prune_redundant_inferred(&mut self) {
        let inferred: Vec<ProjectName> = self
            .projects
            .values()
            .filter(|p| p.is_inferred())
            .map(|p| p.name().clone())
            .collect();
        for name in inferred {
            let roots: Vec<CanonicalPath> =
                self.projects.get(&name).map(|p| p.roots().to_vec()).unwrap_or_default();
            let mut changed = false;
            for root in roots {
                let elsewhere = self
                    .registry
                    .get(&root)
                    .is_some_and(|s| s.containing_projects().iter().any(|p| p != &name));
                if elsewhere {
                    self.detach_script(&root, &name);
                    self.set_inferred_root_tracking(&root, false);
                    changed = true;
                }
            }
            let Some(project) = self.projects.get(&name) else { continue };
            if project.is_rootless() {
                self.remove_project(&name);
            } else if changed && project.is_dirty() {
                self.run_graph_update(&name);
            }
        }
    }

    fn refresh_inferred_projects(&mut self) {
        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();
    }

    // ==================================================================
    // Pending work
    // ==================================================================

    fn schedule_project_update(&mut self, name: ProjectName) {
        let now = Instant::now();
        self.pending_projects.insert(name.clone());
        // The inferred refresh trails every quiescent window that touched a
        // project; keep the bit up while per-project work is queued.
        self.pending_inferred_refresh = true;
        self.debounce.schedule(TaskKey::Project(name), now);
        self.debounce.schedule(TaskKey::RefreshInferred, now);
    }

    /// Run every scheduled task whose debounce deadline has passed. The host
    /// event loop calls this with its clock; [`Debounce::next_deadline`]
    /// via [`ProjectSet::next_deadline`] says when to call again.
    pub fn drain_pending(&mut self, now: Instant) {
        for key in self.debounce.take_due(now) {
            self.run_task(key, now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.next_deadline()
    }

    /// Drain everything regardless of deadlines. Test and shutdown helper.
    pub fn flush_all_pending(&mut self) {
        let mut guard = 0usize;
        while !self.debounce.is_empty() {
            let now = Instant::now();
            for key in self.debounce.take_all() {
                self.run_task(key, now);
            }
            guard += 1;
            assert!(guard < 1000, "pending work failed to quiesce");
        }
    }

    fn run_task(&mut self, key: TaskKey, now: Instant) {
        match key {
            TaskKey::Project(name) => {
                if self.pending_projects.remove(&name) {
                    self.run_graph_update(&name);
                }
            }
            TaskKey::RefreshInferred => {
                if !self.pending_projects.is_empty() {
                    // Per-project updates still queued: try again next tick.
                    self.debounce.schedule(TaskKey::RefreshInferred, now);
                } else {
                    self.pending_inferred_refresh = false;
                    self.refresh_inferred_projects();
                    self.changed_files.clear();
                }
            }
        }
    }

    fn run_graph_update(&mut self, name: &ProjectName) {
        let needs_reload = self.projects.get(name).is_some_and(|p| {
            matches!(p.kind(), ProjectKind::Configured { pending_reload: true, .. })
        });
        if needs_reload {
            self.reload_configured(name);
        }

        let Some(project) = self.projects.get(name) else { return };
        let view = ProjectGraphView {
            name,
            roots: project.roots(),
            options: &project.options,
            language_service_enabled: project.language_service_enabled(),
        };
        let changed = self.graph_builder.update_graph(view);

        let touched: Vec<NormalizedPath> = if changed {
            self.changed_files
                .iter()
                .filter(|file| project.has_root(file))
                .filter_map(|file| self.registry.get(file))
                .map(|script| script.path().clone())
                .collect()
        } else {
            Vec::new()
        };

        self.projects.get_mut(name).expect("checked above").mark_clean(changed);
        for file in touched {
            self.emit(ServerEvent::ContextChanged { project: name.clone(), file });
        }
    }

    fn collect_garbage(&mut self) {
        let pending = std::mem::take(&mut self.pending_script_gc);
        for canon in pending {
            let dead = self
                .registry
                .get(&canon)
                .is_some_and(|script| !script.is_open() && script.is_orphan());
            if !dead {
                continue;
            }
            let mut script = self.registry.remove(&canon).expect("just checked");
            if let Some(handle) = script.take_watcher() {
                self.watches.remove(&handle.id());
            }
        }
    }

    // ==================================================================
    // Reload passes
    // ==================================================================

    /// Re-run the open-file reconciliation (config search, configured
    /// creation, inferred rebalancing) for the given scripts. Invoked when a
    /// config file appears, changes, or disappears somewhere their original
    /// search passed through.
    fn reload_open_files(&mut self, scripts: &[CanonicalPath]) {
        for canon in scripts {
            let Some(script) = self.registry.get(canon) else { continue };
            if !script.is_open() {
                continue;
            }
            let file = script.path().clone();
            let bound = script.open_project_root().cloned();
            let carried_by_external =
                self.projects.values().any(|p| p.is_external() && p.has_root(canon));
            if carried_by_external {
                continue;
            }
            if let Some(config) = self.upward_config_search(canon, &file, bound.as_ref()) {
                self.find_or_create_configured(&config, Some(&file));
            }
        }
        self.assign_orphans_to_inferred();
        self.prune_redundant_inferred();
    }

    /// Mark every configured project pending-reload and schedule it; the
    /// actual re-parse happens at the drained update.
    pub fn reload_projects(&mut self) {
        let configured: Vec<ProjectName> = self
            .projects
            .values()
            .filter(|p| p.is_configured())
            .map(|p| p.name().clone())
            .collect();
        for name in configured {
            if let Some(project) = self.projects.get_mut(&name) {
                if let ProjectKind::Configured { pending_reload, .. } = project.kind_mut() {
                    *pending_reload = true;
                }
                project.mark_dirty();
            }
            self.schedule_project_update(name);
        }
    }

    // ==================================================================
    // Options, host configuration, safelist
    // ==================================================================

    /// Applies to the existing inferred projects and to all future ones.
    pub fn set_compiler_options_for_inferred_projects(&mut self, options: CompilerOptions) {
        self.inferred_options = options.clone();
        let inferred: Vec<ProjectName> = self
            .projects
            .values()
            .filter(|p| p.is_inferred())
            .map(|p| p.name().clone())
            .collect();
        for name in inferred {
            if let Some(project) = self.projects.get_mut(&name) {
                project.options = options.clone();
                project.mark_dirty();
            }
            self.schedule_project_update(name);
        }
    }

    pub fn set_host_configuration(&mut self, args: HostConfiguration) {
        if let Some(file) = &args.file {
            if let Some(format_options) = args.format_options {
                let norm = self.normalize(file);
                let canon = self.canon(&norm);
                self.per_file_format_options.insert(canon, format_options);
            }
            return;
        }
        if let Some(format_options) = args.format_options {
            self.global_format_options = format_options;
        }
        if let Some(host_info) = args.host_info {
            self.host_info = Some(host_info);
        }
        if let Some(extensions) = args.extra_file_extensions {
            self.extra_file_extensions = extensions;
            // Kind classification changed; re-home orphans under the new
            // rules.
            self.refresh_inferred_projects();
        }
    }

    pub fn format_options_for_file(&self, path: &str) -> &FormatOptions {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        self.per_file_format_options.get(&canon).unwrap_or(&self.global_format_options)
    }

    pub fn host_info(&self) -> Option<&str> {
        self.host_info.as_deref()
    }

    pub fn load_safe_list(&mut self, path: &str) -> Result<(), SafeListLoadError> {
        let norm = self.normalize(path);
        let text = self
            .host
            .read_file(&norm)
            .map_err(|source| SafeListLoadError::Read { path: norm.clone(), source })?;
        self.safelist = Safelist::parse(&text)?;
        Ok(())
    }

    pub fn reset_safe_list(&mut self) {
        self.safelist = Safelist::builtin();
    }

    // ==================================================================
    // Typings forwarding
    // ==================================================================

    /// Forward an installer response: the typings become additional project
    /// inputs and the project is rebuilt.
    pub fn apply_typings_response(&mut self, name: &ProjectName, typings: Vec<String>) {
        let cwd = self.host.current_directory();
        let typing_roots: Vec<NormalizedPath> =
            typings.iter().map(|t| NormalizedPath::new(t, &cwd)).collect();
        let Some(project) = self.projects.get_mut(name) else {
            tracing::debug!(project = %name, "typings response for unknown project");
            return;
        };
        project.set_typing_roots(typing_roots);
        self.schedule_project_update(name.clone());
    }

    // ==================================================================
    // Queries
    // ==================================================================

    pub fn find_project(&self, name: &ProjectName) -> Option<&Project> {
        self.projects.get(name)
    }

    pub fn get_script_info(&self, path: &str) -> Option<&ScriptInfo> {
        let norm = self.normalize(path);
        self.registry.get(&self.canon(&norm))
    }

    /// The project that answers queries for `path`. With `refresh`, the
    /// open-file reconciliation runs first.
    pub fn get_default_project_for_file(
        &mut self,
        path: &str,
        refresh: bool,
    ) -> Option<ProjectName> {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        if refresh {
            self.reload_open_files(&[canon.clone()]);
        }
        self.registry.get(&canon)?.default_project().cloned()
    }

    /// Projects whose version differs from the caller's record, plus the
    /// names the caller knows that no longer exist.
    pub fn synchronize_project_list(
        &self,
        known: &[(ProjectName, u64)],
    ) -> ProjectVersionDelta {
        let known_map: HashMap<&ProjectName, u64> =
            known.iter().map(|(name, version)| (name, *version)).collect();
        let mut delta = ProjectVersionDelta::default();
        for (name, project) in &self.projects {
            if known_map.get(name) == Some(&project.version()) {
                continue;
            }
            delta.changed.push(ProjectVersionInfo {
                name: name.clone(),
                version: project.version(),
                roots: project
                    .roots()
                    .iter()
                    .filter_map(|root| self.registry.get(root))
                    .map(|script| script.path().clone())
                    .collect(),
                options: project.options.clone(),
            });
        }
        for (name, _) in known {
            if !self.projects.contains_key(name) {
                delta.removed.push(name.clone());
            }
        }
        delta
    }

    pub fn open_files(&self) -> &[CanonicalPath] {
        &self.open_files
    }

    pub fn project_names(&self) -> Vec<ProjectName> {
        self.projects.keys().cloned().collect()
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn inferred_project_count(&self) -> usize {
        self.projects.values().filter(|p| p.is_inferred()).count()
    }

    pub fn script_count(&self) -> usize {
        self.registry.len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.pending_projects.is_empty() || self.pending_inferred_refresh
    }

    /// Bytes currently charged against the non-source size budget.
    pub fn accounted_size_total(&self) -> u64 {
        self.size_limit.accounted_total()
    }

    pub fn size_budget(&self) -> u64 {
        self.size_limit.budget()
    }

    /// Where a config path sits in the watcher state machine.
    pub fn config_presence_state(&self, path: &str) -> PresenceState {
        let norm = self.normalize(path);
        let canon = self.canon(&norm);
        if self.projects.contains_key(&ProjectName::Configured(canon.clone())) {
            return PresenceState::Adopted;
        }
        match self.presence.get(&canon) {
            None => PresenceState::Absent,
            Some(entry) if entry.is_untracked() => PresenceState::Absent,
            Some(entry) if entry.has_root_tracker() => PresenceState::GhostWatched,
            Some(_) => PresenceState::Ghost,
        }
    }

    /// Every script invariant the registry must uphold, asserted in one
    /// place so property tests can call it after arbitrary interleavings.
    #[doc(hidden)]
    pub fn assert_watch_invariants(&self) {
        for script in self.registry.iter() {
            let should_watch = !script.is_open() && !script.has_mixed_content();
            assert_eq!(
                script.has_watcher(),
                should_watch,
                "script watcher invariant violated for {}",
                script.path()
            );
        }
        for (canon, entry) in self.presence.iter() {
            let adopted =
                self.projects.contains_key(&ProjectName::Configured(canon.clone()));
            let expect_watch = !adopted && entry.has_root_tracker();
            assert_eq!(
                entry.has_watcher(),
                expect_watch,
                "presence watcher invariant violated for {canon}"
            );
        }
    }

    // ==================================================================
    // Internals
    // ==================================================================

    fn normalize(&self, raw: &str) -> NormalizedPath {
        NormalizedPath::new(raw, &self.host.current_directory())
    }

    fn canon(&self, path: &NormalizedPath) -> CanonicalPath {
        self.host.canonical(path)
    }

    fn emit_project_telemetry(&self, name: &ProjectName, taxonomy: ProjectTaxonomy) {
        let Some(project) = self.projects.get(name) else { return };
        let id_source = match project.kind() {
            ProjectKind::Configured { config_file, .. } => config_file.as_str().to_string(),
            _ => name.to_string(),
        };
        let mut counts = FileExtensionCounts::default();
        for root in project.roots() {
            if let Some(script) = self.registry.get(root) {
                counts.count(script.path().file_name());
            }
        }
        self.emit(ServerEvent::ProjectInfoTelemetry(ProjectInfoTelemetry {
            project_id: self.host.create_hash(&id_source),
            file_counts: counts,
            compiler_options: scrub_compiler_options(&project.options),
            project_type: taxonomy,
            language_service_enabled: project.language_service_enabled(),
            type_acquisition_enabled: project.type_acquisition.enable == Some(true),
        }));
    }
}
