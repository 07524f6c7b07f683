use serde::{Deserialize, Serialize};

use crate::ScriptKind;

/// The compiler-options record carried by every project.
///
/// Only the options the coordinator itself consults are typed here; the
/// compiler collaborator receives the whole record. Enum-valued options
/// serialize as their camelCase names, which is also the form the telemetry
/// scrubber emits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub declaration: Option<bool>,
    pub no_emit: Option<bool>,
    pub source_map: Option<bool>,
    pub strict: Option<bool>,
    pub disable_size_limit: Option<bool>,
    pub target: Option<ScriptTarget>,
    pub module: Option<ModuleKind>,
    pub module_resolution: Option<ModuleResolutionKind>,
    pub jsx: Option<JsxEmit>,
    pub max_node_module_js_depth: Option<u32>,
    // Path-bearing options. Omitted from telemetry.
    pub out_dir: Option<String>,
    pub out_file: Option<String>,
    pub root_dir: Option<String>,
    pub base_url: Option<String>,
    pub type_roots: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptTarget {
    Es3,
    Es5,
    Es2015,
    Es2016,
    Es2017,
    EsNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKind {
    None,
    CommonJs,
    Amd,
    Umd,
    System,
    Es2015,
    EsNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleResolutionKind {
    Classic,
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsxEmit {
    None,
    Preserve,
    React,
    ReactNative,
}

/// Per-file or global formatting preferences pushed by the client via host
/// configuration. Opaque to the coordinator; stored and handed back to the
/// language-service layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    pub indent_size: u32,
    pub tab_size: u32,
    pub new_line_character: String,
    pub convert_tabs_to_spaces: bool,
    pub insert_space_after_comma_delimiter: bool,
    pub insert_space_after_semicolon_in_for_statements: bool,
    pub insert_space_before_and_after_binary_operators: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            tab_size: 4,
            new_line_character: "\n".to_string(),
            convert_tabs_to_spaces: true,
            insert_space_after_comma_delimiter: true,
            insert_space_after_semicolon_in_for_statements: true,
            insert_space_before_and_after_binary_operators: true,
        }
    }
}

/// A client-registered extra file extension, e.g. mapping `.vue` files to a
/// script kind with mixed content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExtensionInfo {
    /// Extension including the leading dot.
    pub extension: String,
    pub is_mixed_content: bool,
    pub script_kind: Option<ScriptKind>,
}
