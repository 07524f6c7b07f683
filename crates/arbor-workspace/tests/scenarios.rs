//! End-to-end scenarios driven through the public API against the
//! deterministic in-memory host.

use std::sync::Arc;
use std::time::Duration;

use arbor_vfs::{MemoryHost, ServerHost};
use arbor_workspace::graph::RecordingGraphBuilder;
use arbor_workspace::{
    ExternalProjectSpec, PresenceState, ProjectName, ProjectSet, ProjectSetOptions, ServerEvent,
};
use pretty_assertions::assert_eq;

fn setup() -> (ProjectSet, Arc<MemoryHost>, RecordingGraphBuilder) {
    let host = Arc::new(MemoryHost::new());
    let mut set = ProjectSet::with_options(
        Arc::clone(&host) as Arc<dyn ServerHost>,
        ProjectSetOptions { throttle_delay: Duration::ZERO, ..ProjectSetOptions::default() },
    );
    let builder = RecordingGraphBuilder::new();
    set.set_graph_builder(Box::new(builder.clone()));
    (set, host, builder)
}

fn configured(set: &ProjectSet, host: &MemoryHost, path: &str) -> ProjectName {
    let norm = arbor_core::NormalizedPath::new_absolute(path);
    let name = ProjectName::Configured(host.canonical(&norm));
    assert!(set.find_project(&name).is_some(), "expected a configured project for {path}");
    name
}

#[test]
fn orphan_open_file_gets_an_inferred_project() {
    // S1: no config anywhere on the ancestor chain.
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/b/c.ts", "let x = 1;");

    let result = set.open_client_file("/a/b/c.ts", Some("let x = 1;".into()), None, None);

    assert!(result.config_file_name.is_none());
    assert_eq!(set.inferred_project_count(), 1);
    let script = set.get_script_info("/a/b/c.ts").unwrap();
    assert_eq!(script.containing_projects().len(), 1);
    assert!(matches!(script.containing_projects()[0], ProjectName::Inferred(_)));

    // The probed config locations are tracked by an inferred root, so each
    // sits in Ghost-watched with a watcher armed.
    assert_eq!(set.config_presence_state("/a/b/tsconfig.json"), PresenceState::GhostWatched);
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::GhostWatched);
    assert_eq!(set.config_presence_state("/tsconfig.json"), PresenceState::GhostWatched);
    set.assert_watch_invariants();
}

#[test]
fn config_on_ancestor_adopts_the_open_file() {
    // S2: the config exists before the open.
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");

    let result = set.open_client_file("/a/b/c.ts", None, None, None);

    assert_eq!(
        result.config_file_name.as_ref().map(|p| p.as_str()),
        Some("/a/tsconfig.json")
    );
    assert_eq!(set.inferred_project_count(), 0);

    let name = configured(&set, &host, "/a/tsconfig.json");
    let project = set.find_project(&name).unwrap();
    assert_eq!(project.root_count(), 1);
    assert_eq!(project.open_refs(), 1);
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::Adopted);
    // The closer probe found nothing and its tracker is not an inferred
    // root, so it parks in Ghost.
    assert_eq!(set.config_presence_state("/a/b/tsconfig.json"), PresenceState::Ghost);
    set.assert_watch_invariants();
}

#[test]
fn file_outside_the_config_file_list_gets_its_own_inferred_project() {
    // S3: d.ts is not in the configured project's files.
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    host.seed_file("/a/b/d.ts", "let y = 2;");

    set.open_client_file("/a/b/c.ts", None, None, None);
    let result = set.open_client_file("/a/b/d.ts", None, None, None);

    // The search still resolves to the config, but the project is
    // untouched.
    assert_eq!(
        result.config_file_name.as_ref().map(|p| p.as_str()),
        Some("/a/tsconfig.json")
    );
    let name = configured(&set, &host, "/a/tsconfig.json");
    let project = set.find_project(&name).unwrap();
    assert_eq!(project.root_count(), 1);

    assert_eq!(set.inferred_project_count(), 1);
    let c = set.get_script_info("/a/b/c.ts").unwrap();
    assert_eq!(c.containing_projects(), &[name]);
    let d = set.get_script_info("/a/b/d.ts").unwrap();
    assert!(matches!(d.containing_projects(), [ProjectName::Inferred(_)]));
    set.assert_watch_invariants();
}

#[test]
fn deleting_the_config_rehomes_the_open_file() {
    // S4: the adopted config disappears.
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    set.open_client_file("/a/b/c.ts", None, None, None);

    for event in host.delete_file("/a/tsconfig.json") {
        set.handle_watch_event(&event);
    }

    let norm = arbor_core::NormalizedPath::new_absolute("/a/tsconfig.json");
    assert!(set.find_project(&ProjectName::Configured(host.canonical(&norm))).is_none());
    assert_eq!(set.inferred_project_count(), 1);
    let c = set.get_script_info("/a/b/c.ts").unwrap();
    assert!(matches!(c.containing_projects(), [ProjectName::Inferred(_)]));

    // c.ts is an inferred root again, so the presence entry survives in
    // Ghost-watched, waiting for the config to come back.
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::GhostWatched);
    set.assert_watch_invariants();
}

#[test]
fn config_appearing_later_adopts_the_inferred_root() {
    // Ghost-watched -> Adopted: the watcher on a probed location fires when
    // the config is created and the open file re-resolves.
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/b/c.ts", "let x = 1;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    assert_eq!(set.inferred_project_count(), 1);

    for event in host.create_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#) {
        set.handle_watch_event(&event);
    }

    let name = configured(&set, &host, "/a/tsconfig.json");
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::Adopted);
    assert_eq!(set.inferred_project_count(), 0);
    let c = set.get_script_info("/a/b/c.ts").unwrap();
    assert_eq!(c.containing_projects(), &[name]);
    set.assert_watch_invariants();
}

#[test]
fn oversized_external_project_runs_without_a_language_service() {
    // S5: 2 MiB + 19 MiB of JavaScript blows the 20 MiB budget.
    let (mut set, host, _builder) = setup();
    host.seed_file("/proj/p.js", &"x".repeat(2 * 1024 * 1024));
    host.seed_file("/proj/q.js", &"x".repeat(19 * 1024 * 1024));
    let events = set.subscribe();

    set.open_external_project(ExternalProjectSpec {
        project_name: "proj".to_string(),
        root_files: vec!["/proj/p.js".to_string(), "/proj/q.js".to_string()],
        ..ExternalProjectSpec::default()
    });

    let name = ProjectName::External("proj".to_string());
    let project = set.find_project(&name).unwrap();
    assert!(!project.language_service_enabled());
    // Both files are still scripts of the project.
    assert_eq!(project.root_count(), 2);
    assert!(set.get_script_info("/proj/p.js").is_some());
    assert!(set.get_script_info("/proj/q.js").is_some());

    let received: Vec<ServerEvent> = events.try_iter().collect();
    assert!(received.iter().any(|event| matches!(
        event,
        ServerEvent::LanguageServiceState { enabled: false, .. }
    )));
    assert!(received.iter().any(|event| matches!(
        event,
        ServerEvent::ProjectInfoTelemetry(info) if !info.language_service_enabled
    )));

    // No wildcard or type-root watchers: only the two closed scripts are
    // watched.
    assert_eq!(host.active_watch_count(), 2);
    set.assert_watch_invariants();
}

#[test]
fn safelisted_bundle_is_dropped_and_contributes_typings() {
    // S6: the jquery rule strips the bundle and injects the typing.
    let (mut set, host, _builder) = setup();
    host.seed_file(
        "/safelist.json",
        r#"{"jquery": {"match": "jquery.*\\.js$", "types": ["jquery"]}}"#,
    );
    set.load_safe_list("/safelist.json").unwrap();

    set.open_external_project(ExternalProjectSpec {
        project_name: "app".to_string(),
        root_files: vec!["/app/lib/jquery-1.10.2.min.js".to_string()],
        ..ExternalProjectSpec::default()
    });

    let project = set.find_project(&ProjectName::External("app".to_string())).unwrap();
    assert_eq!(project.root_count(), 0);
    assert_eq!(project.type_acquisition.include, vec!["jquery".to_string()]);
}

#[test]
fn closing_the_last_open_file_removes_the_configured_project() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    let name = configured(&set, &host, "/a/tsconfig.json");

    set.close_client_file("/a/b/c.ts");

    assert!(set.find_project(&name).is_none());
    assert!(set.open_files().is_empty());
    // The close also dropped the file's presence trackers.
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::Absent);
    set.assert_watch_invariants();
}

#[test]
fn closing_an_unknown_file_is_a_no_op() {
    let (mut set, _host, _builder) = setup();
    set.close_client_file("/never/opened.ts");
    assert!(set.open_files().is_empty());
}

#[test]
fn duplicate_opens_are_idempotent() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");

    set.open_client_file("/a/b/c.ts", None, None, None);
    set.open_client_file("/a/b/c.ts", Some("let x = 2;".into()), None, None);

    assert_eq!(set.open_files().len(), 1);
    let name = configured(&set, &host, "/a/tsconfig.json");
    assert_eq!(set.find_project(&name).unwrap().open_refs(), 1);
    assert_eq!(set.get_script_info("/a/b/c.ts").unwrap().contents(), Some("let x = 2;"));
}

#[test]
fn closed_project_member_reload_is_debounced_into_one_update() {
    let (mut set, host, builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts", "b/d.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    host.seed_file("/a/b/d.ts", "let y = 2;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    let name = configured(&set, &host, "/a/tsconfig.json");
    builder.clear();

    // Disk churn on the closed member d.ts.
    for _ in 0..5 {
        for event in host.change_file("/a/b/d.ts", "let y = 3;") {
            set.handle_watch_event(&event);
        }
    }
    set.flush_all_pending();

    assert_eq!(builder.update_count_for(&name), 1);
}

#[test]
fn config_change_marks_pending_reload_and_reloads_on_update() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    host.seed_file("/a/b/d.ts", "let y = 2;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    let name = configured(&set, &host, "/a/tsconfig.json");

    for event in host.change_file("/a/tsconfig.json", r#"{"files": ["b/c.ts", "b/d.ts"]}"#) {
        set.handle_watch_event(&event);
    }
    set.flush_all_pending();

    let project = set.find_project(&name).unwrap();
    assert_eq!(project.root_count(), 2);
    let d = set.get_script_info("/a/b/d.ts").unwrap();
    assert_eq!(d.containing_projects(), std::slice::from_ref(&name));
    set.assert_watch_invariants();
}

#[test]
fn open_file_dropped_by_a_config_reload_falls_back_to_inferred() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts", "b/d.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    host.seed_file("/a/b/d.ts", "let y = 2;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    set.open_client_file("/a/b/d.ts", None, None, None);
    assert_eq!(set.inferred_project_count(), 0);

    for event in host.change_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#) {
        set.handle_watch_event(&event);
    }
    set.flush_all_pending();

    // d.ts fell out of the configured project; the tail-of-quiesce inferred
    // refresh re-homed it.
    let d = set.get_script_info("/a/b/d.ts").unwrap();
    assert!(matches!(d.containing_projects(), [ProjectName::Inferred(_)]));
    set.assert_watch_invariants();
}

#[test]
fn deleting_a_closed_script_detaches_it_everywhere() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts", "b/d.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    host.seed_file("/a/b/d.ts", "let y = 2;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    let name = configured(&set, &host, "/a/tsconfig.json");
    assert!(set.get_script_info("/a/b/d.ts").is_some());

    for event in host.delete_file("/a/b/d.ts") {
        set.handle_watch_event(&event);
    }
    set.flush_all_pending();

    assert!(set.get_script_info("/a/b/d.ts").is_none());
    assert_eq!(set.find_project(&name).unwrap().root_count(), 1);
    set.assert_watch_invariants();
}

#[test]
fn get_default_project_prefers_the_higher_priority_carrier() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    set.open_client_file("/a/b/c.ts", None, None, None);

    let name = set.get_default_project_for_file("/a/b/c.ts", false).unwrap();
    assert!(matches!(name, ProjectName::Configured(_)));
}

#[test]
fn context_events_fire_for_edited_files_after_the_debounced_update() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c.ts"]}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    set.open_client_file("/a/b/c.ts", None, None, None);
    let events = set.subscribe();

    set.apply_changes_in_open_files(
        Vec::new(),
        vec![arbor_workspace::FileEdits {
            path: "/a/b/c.ts".to_string(),
            changes: vec![arbor_core::TextChange::new(4, 5, "y")],
        }],
        Vec::new(),
    );
    assert_eq!(set.get_script_info("/a/b/c.ts").unwrap().contents(), Some("let y = 1;"));
    set.flush_all_pending();

    let received: Vec<ServerEvent> = events.try_iter().collect();
    assert!(received.iter().any(|event| matches!(
        event,
        ServerEvent::ContextChanged { file, .. } if file.as_str() == "/a/b/c.ts"
    )));
}

#[test]
fn bounded_search_stops_at_the_project_root() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": ["b/c/d.ts"]}"#);
    host.seed_file("/a/b/c/d.ts", "let x = 1;");

    // The bound sits below the config, so the search never reaches it.
    let result = set.open_client_file("/a/b/c/d.ts", None, None, Some("/a/b"));

    assert!(result.config_file_name.is_none());
    assert_eq!(set.inferred_project_count(), 1);
    assert_eq!(set.config_presence_state("/a/tsconfig.json"), PresenceState::Absent);
}

#[test]
fn config_diagnostics_are_attached_not_raised() {
    let (mut set, host, _builder) = setup();
    host.seed_file("/a/tsconfig.json", r#"{"files": []}"#);
    host.seed_file("/a/b/c.ts", "let x = 1;");
    let events = set.subscribe();

    let result = set.open_client_file("/a/b/c.ts", None, None, None);

    assert_eq!(result.config_file_name.as_ref().map(|p| p.as_str()), Some("/a/tsconfig.json"));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, arbor_core::CODE_EMPTY_FILES_LIST);
    // The project still exists with whatever the parse yielded.
    configured(&set, &host, "/a/tsconfig.json");

    let received: Vec<ServerEvent> = events.try_iter().collect();
    assert!(received.iter().any(|event| matches!(
        event,
        ServerEvent::ConfigFileDiagnostics { diagnostics, .. } if !diagnostics.is_empty()
    )));
}
