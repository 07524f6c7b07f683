//! External project declarations: deltas, config adoption, and the
//! safelist interplay.

use std::sync::Arc;
use std::time::Duration;

use arbor_core::NormalizedPath;
use arbor_vfs::{MemoryHost, ServerHost};
use arbor_workspace::graph::RecordingGraphBuilder;
use arbor_workspace::{ExternalProjectSpec, ProjectName, ProjectSet, ProjectSetOptions};
use pretty_assertions::assert_eq;

fn setup() -> (ProjectSet, Arc<MemoryHost>) {
    let host = Arc::new(MemoryHost::new());
    let mut set = ProjectSet::with_options(
        Arc::clone(&host) as Arc<dyn ServerHost>,
        ProjectSetOptions { throttle_delay: Duration::ZERO, ..ProjectSetOptions::default() },
    );
    set.set_graph_builder(Box::new(RecordingGraphBuilder::new()));
    (set, host)
}

fn spec(name: &str, roots: &[&str]) -> ExternalProjectSpec {
    ExternalProjectSpec {
        project_name: name.to_string(),
        root_files: roots.iter().map(|r| r.to_string()).collect(),
        ..ExternalProjectSpec::default()
    }
}

fn configured_name(host: &MemoryHost, path: &str) -> ProjectName {
    ProjectName::Configured(host.canonical(&NormalizedPath::new_absolute(path)))
}

#[test]
fn external_roots_become_project_scripts() {
    let (mut set, host) = setup();
    host.seed_file("/p/a.ts", "export {};");
    host.seed_file("/p/b.ts", "export {};");

    set.open_external_project(spec("p", &["/p/a.ts", "/p/b.ts"]));

    let project = set.find_project(&ProjectName::External("p".to_string())).unwrap();
    assert_eq!(project.root_count(), 2);
    assert!(set.get_script_info("/p/a.ts").is_some());
    set.assert_watch_invariants();
}

#[test]
fn reopening_the_same_declaration_is_a_round_trip() {
    // P7: opening the same list twice leaves the project set and every root
    // set unchanged.
    let (mut set, host) = setup();
    host.seed_file("/p/a.ts", "export {};");
    host.seed_file("/q/b.ts", "export {};");
    let specs = vec![spec("p", &["/p/a.ts"]), spec("q", &["/q/b.ts"])];

    set.open_external_projects(specs.clone());
    let names_before = set.project_names();
    let roots_before: Vec<Vec<_>> =
        set.projects().map(|p| p.roots().to_vec()).collect();

    set.open_external_projects(specs);

    assert_eq!(set.project_names(), names_before);
    let roots_after: Vec<Vec<_>> = set.projects().map(|p| p.roots().to_vec()).collect();
    assert_eq!(roots_after, roots_before);
}

#[test]
fn declaration_delta_closes_absent_projects() {
    let (mut set, host) = setup();
    host.seed_file("/p/a.ts", "export {};");
    host.seed_file("/q/b.ts", "export {};");

    set.open_external_projects(vec![spec("p", &["/p/a.ts"]), spec("q", &["/q/b.ts"])]);
    set.open_external_projects(vec![spec("p", &["/p/a.ts"])]);

    assert!(set.find_project(&ProjectName::External("p".to_string())).is_some());
    assert!(set.find_project(&ProjectName::External("q".to_string())).is_none());
    // q's script lost its last membership and was collected.
    assert!(set.get_script_info("/q/b.ts").is_none());
    set.assert_watch_invariants();
}

#[test]
fn external_config_roots_are_adopted_as_configured_projects() {
    let (mut set, host) = setup();
    host.seed_file("/p/tsconfig.json", r#"{"files": ["a.ts"]}"#);
    host.seed_file("/p/a.ts", "export {};");

    set.open_external_project(spec("p", &["/p/tsconfig.json"]));

    // The external name maps to the config; no External project object.
    assert!(set.find_project(&ProjectName::External("p".to_string())).is_none());
    let configured = configured_name(&host, "/p/tsconfig.json");
    assert!(set.find_project(&configured).is_some());

    set.close_external_project("p");
    assert!(set.find_project(&configured).is_none());
    set.assert_watch_invariants();
}

#[test]
fn config_adopted_by_two_externals_survives_one_close() {
    let (mut set, host) = setup();
    host.seed_file("/p/tsconfig.json", r#"{"files": ["a.ts"]}"#);
    host.seed_file("/p/a.ts", "export {};");

    set.open_external_project(spec("one", &["/p/tsconfig.json"]));
    set.open_external_project(spec("two", &["/p/tsconfig.json"]));
    let configured = configured_name(&host, "/p/tsconfig.json");

    set.close_external_project("one");
    assert!(set.find_project(&configured).is_some());
    set.close_external_project("two");
    assert!(set.find_project(&configured).is_none());
}

#[test]
fn adopted_config_with_open_files_outlives_the_external() {
    let (mut set, host) = setup();
    host.seed_file("/p/tsconfig.json", r#"{"files": ["a.ts"]}"#);
    host.seed_file("/p/a.ts", "export {};");

    set.open_external_project(spec("p", &["/p/tsconfig.json"]));
    set.open_client_file("/p/a.ts", None, None, None);
    let configured = configured_name(&host, "/p/tsconfig.json");

    // The open file keeps the configured project alive past the external.
    set.close_external_project("p");
    assert!(set.find_project(&configured).is_some());

    set.close_client_file("/p/a.ts");
    assert!(set.find_project(&configured).is_none());
    set.assert_watch_invariants();
}

#[test]
fn external_project_is_the_carrier_for_its_open_files() {
    let (mut set, host) = setup();
    // A config exists on the ancestor chain, but the external declaration
    // wins as carrier and the search never runs.
    host.seed_file("/p/tsconfig.json", r#"{"files": ["a.ts"]}"#);
    host.seed_file("/p/a.ts", "export {};");
    set.open_external_project(spec("ext", &["/p/a.ts"]));

    let result = set.open_client_file("/p/a.ts", None, None, None);

    assert!(result.config_file_name.is_none());
    assert!(set.find_project(&configured_name(&host, "/p/tsconfig.json")).is_none());
    assert_eq!(
        set.get_default_project_for_file("/p/a.ts", false),
        Some(ProjectName::External("ext".to_string()))
    );
    assert_eq!(
        set.find_project(&ProjectName::External("ext".to_string())).unwrap().open_refs(),
        1
    );
    set.assert_watch_invariants();
}

#[test]
fn open_file_in_closed_external_falls_back_to_inferred() {
    let (mut set, host) = setup();
    host.seed_file("/p/a.ts", "export {};");
    set.open_external_project(spec("ext", &["/p/a.ts"]));
    set.open_client_file("/p/a.ts", None, None, None);
    assert_eq!(set.inferred_project_count(), 0);

    set.close_external_project("ext");

    let script = set.get_script_info("/p/a.ts").unwrap();
    assert!(matches!(script.containing_projects(), [ProjectName::Inferred(_)]));
    set.assert_watch_invariants();
}

#[test]
fn size_budget_frees_up_when_an_external_closes() {
    let host = Arc::new(MemoryHost::new());
    let mut set = ProjectSet::with_options(
        Arc::clone(&host) as Arc<dyn ServerHost>,
        ProjectSetOptions {
            throttle_delay: Duration::ZERO,
            size_budget: 10,
            ..ProjectSetOptions::default()
        },
    );
    host.seed_file("/p/a.js", &"x".repeat(8));
    host.seed_file("/q/b.js", &"x".repeat(8));

    set.open_external_project(spec("p", &["/p/a.js"]));
    set.open_external_project(spec("q", &["/q/b.js"]));
    let q = ProjectName::External("q".to_string());
    assert!(!set.find_project(&q).unwrap().language_service_enabled());

    set.close_external_project("p");
    // Re-declaring q re-runs admission into the freed budget.
    set.open_external_project(spec("q", &["/q/b.js"]));
    assert!(set.find_project(&q).unwrap().language_service_enabled());
    assert!(set.accounted_size_total() <= set.size_budget());
}

#[test]
fn external_updates_replace_the_root_set() {
    let (mut set, host) = setup();
    host.seed_file("/p/a.ts", "export {};");
    host.seed_file("/p/b.ts", "export {};");

    set.open_external_project(spec("p", &["/p/a.ts"]));
    set.open_external_project(spec("p", &["/p/b.ts"]));

    let project = set.find_project(&ProjectName::External("p".to_string())).unwrap();
    let roots: Vec<&str> = project.roots().iter().map(|r| r.as_str()).collect();
    assert_eq!(roots, vec!["/p/b.ts"]);
    // a.ts lost its last membership and was collected.
    assert!(set.get_script_info("/p/a.ts").is_none());
}
