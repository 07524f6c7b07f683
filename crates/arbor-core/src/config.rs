use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CompilerOptions, NormalizedPath};

/// "The config file is empty."
pub const CODE_EMPTY_FILES_LIST: u32 = 18002;
/// "No inputs were found in config file."
pub const CODE_NO_INPUTS: u32 = 18003;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
}

/// A diagnostic produced while reading or interpreting a configuration file.
///
/// These are attached to the owning project and surfaced through the
/// config-file-diagnostics event; they are never raised as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDiagnostic {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: String,
}

impl ConfigDiagnostic {
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self { code, category: DiagnosticCategory::Error, message: message.into() }
    }
}

/// How deep a wildcard-directory watch must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchDepth {
    Shallow,
    Recursive,
}

/// Automatic typings-acquisition preferences, parsed from configuration or
/// pushed with an external project declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeAcquisition {
    pub enable: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// The typed result of parsing a configuration file.
///
/// Produced by the external parser collaborator; the coordinator only reads
/// it. `file_names` are absolute. The `has_*` flags record which specs were
/// present in the source text, which drives both diagnostics (an empty file
/// list with a files/include spec present is reported) and the
/// wildcard-watch decision.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedConfig {
    pub options: CompilerOptions,
    pub file_names: Vec<NormalizedPath>,
    pub wildcard_directories: BTreeMap<NormalizedPath, WatchDepth>,
    pub has_files_spec: bool,
    pub has_include_spec: bool,
    pub has_exclude_spec: bool,
    pub has_extends: bool,
    pub type_acquisition: TypeAcquisition,
    pub compile_on_save: bool,
    pub diagnostics: Vec<ConfigDiagnostic>,
}
