use std::fmt;

use arbor_core::{CompilerOptions, ConfigDiagnostic, NormalizedPath};
use arbor_project::ProjectName;
use serde::Serialize;

/// Which kind of non-inferred project a telemetry record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectTaxonomy {
    External,
    Configured,
}

impl fmt::Display for ProjectTaxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectTaxonomy::External => f.write_str("external"),
            ProjectTaxonomy::Configured => f.write_str("configured"),
        }
    }
}

/// Root-file counts by extension class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileExtensionCounts {
    pub ts: usize,
    pub tsx: usize,
    pub dts: usize,
    pub js: usize,
    pub jsx: usize,
    pub other: usize,
}

impl FileExtensionCounts {
    pub fn count(&mut self, file_name: &str) {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".d.ts") {
            self.dts += 1;
        } else if lower.ends_with(".ts") {
            self.ts += 1;
        } else if lower.ends_with(".tsx") {
            self.tsx += 1;
        } else if lower.ends_with(".js") {
            self.js += 1;
        } else if lower.ends_with(".jsx") {
            self.jsx += 1;
        } else {
            self.other += 1;
        }
    }
}

/// A scrubbed per-project record, safe to ship off-box: the id is a hash,
/// enum options are stringified, and path-bearing options are omitted
/// entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfoTelemetry {
    pub project_id: String,
    pub file_counts: FileExtensionCounts,
    pub compiler_options: serde_json::Value,
    pub project_type: ProjectTaxonomy,
    pub language_service_enabled: bool,
    pub type_acquisition_enabled: bool,
}

/// Fire-and-forget events emitted by the coordinator. A single subscriber
/// receives them; without one they are dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A project whose graph just changed, per edited file it contains.
    ContextChanged { project: ProjectName, file: NormalizedPath },
    ConfigFileDiagnostics {
        trigger_file: NormalizedPath,
        config_file: NormalizedPath,
        diagnostics: Vec<ConfigDiagnostic>,
    },
    LanguageServiceState { project: ProjectName, enabled: bool },
    ProjectInfoTelemetry(ProjectInfoTelemetry),
}

const PATH_BEARING_OPTIONS: &[&str] =
    &["outDir", "outFile", "rootDir", "baseUrl", "typeRoots"];

/// Serialize options for telemetry: enum values become their camelCase
/// names, unset options disappear, path-valued options are dropped.
pub(crate) fn scrub_compiler_options(options: &CompilerOptions) -> serde_json::Value {
    let mut value = serde_json::to_value(options).unwrap_or_default();
    if let serde_json::Value::Object(map) = &mut value {
        map.retain(|key, entry| !entry.is_null() && !PATH_BEARING_OPTIONS.contains(&key.as_str()));
    }
    value
}
