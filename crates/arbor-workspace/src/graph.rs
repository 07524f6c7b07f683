//! Contract between the coordinator and the compiler's graph builder.

use std::sync::{Arc, Mutex};

use arbor_core::{CanonicalPath, CompilerOptions};
use arbor_project::ProjectName;

/// Read-only view of a project handed to the builder for one update.
#[derive(Debug)]
pub struct ProjectGraphView<'a> {
    pub name: &'a ProjectName,
    pub roots: &'a [CanonicalPath],
    pub options: &'a CompilerOptions,
    pub language_service_enabled: bool,
}

/// The compiler collaborator that (re)builds a project's program graph.
///
/// Called once per drained pending entry; returns whether the graph actually
/// changed. Long builds block; the coordinator never interleaves them with
/// other entry points.
pub trait GraphBuilder: Send {
    fn update_graph(&mut self, project: ProjectGraphView<'_>) -> bool;
}

/// Builder that does nothing and reports every update as a change.
#[derive(Debug, Default)]
pub struct NoopGraphBuilder;

impl GraphBuilder for NoopGraphBuilder {
    fn update_graph(&mut self, _project: ProjectGraphView<'_>) -> bool {
        true
    }
}

/// Test double that records which projects were updated, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingGraphBuilder {
    log: Arc<Mutex<Vec<ProjectName>>>,
}

impl RecordingGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProjectName> {
        self.log.lock().unwrap().clone()
    }

    pub fn update_count_for(&self, name: &ProjectName) -> usize {
        self.log.lock().unwrap().iter().filter(|n| *n == name).count()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

impl GraphBuilder for RecordingGraphBuilder {
    fn update_graph(&mut self, project: ProjectGraphView<'_>) -> bool {
        self.log.lock().unwrap().push(project.name.clone());
        true
    }
}
