//! Shared types for the Arbor project-set coordinator.
//!
//! This crate holds the vocabulary the rest of the workspace speaks:
//! - normalized and canonical paths ([`NormalizedPath`], [`CanonicalPath`])
//! - script classification ([`ScriptKind`])
//! - the compiler-options record and related configuration types
//! - the parsed-configuration contract filled in by an external parser
//! - text edits applied to open buffers

mod config;
mod edit;
mod options;
mod path;
mod script;

pub use config::{
    ConfigDiagnostic, DiagnosticCategory, ParsedConfig, TypeAcquisition, WatchDepth,
    CODE_EMPTY_FILES_LIST, CODE_NO_INPUTS,
};
pub use edit::TextChange;
pub use options::{
    CompilerOptions, FileExtensionInfo, FormatOptions, JsxEmit, ModuleKind, ModuleResolutionKind,
    ScriptTarget,
};
pub use path::{CanonicalPath, NormalizedPath};
pub use script::ScriptKind;
