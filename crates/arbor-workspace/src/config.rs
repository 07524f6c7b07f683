use std::collections::BTreeMap;

use arbor_core::{
    CompilerOptions, ConfigDiagnostic, NormalizedPath, ParsedConfig, TypeAcquisition, WatchDepth,
    CODE_EMPTY_FILES_LIST, CODE_NO_INPUTS,
};
use serde::Deserialize;

/// Turns configuration text into the typed record the coordinator consumes.
///
/// The real compiler front-end supplies the production implementation;
/// failures are reported through [`ParsedConfig::diagnostics`], never
/// raised, and a partially-usable record is always returned.
pub trait ConfigParser: Send {
    fn parse(&self, text: &str, config_path: &NormalizedPath) -> ParsedConfig;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    compiler_options: CompilerOptions,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    extends: Option<String>,
    compile_on_save: Option<bool>,
    type_acquisition: Option<TypeAcquisition>,
}

/// Minimal JSON configuration parser.
///
/// Supports explicit `files` lists (resolved against the config directory)
/// and records `include` patterns as wildcard-directory watch requests.
/// It does not enumerate the filesystem, so `include` contributes watches
/// but no file names; hosts with a full compiler front-end install their own
/// [`ConfigParser`].
#[derive(Debug, Default)]
pub struct JsonConfigParser;

impl ConfigParser for JsonConfigParser {
    fn parse(&self, text: &str, config_path: &NormalizedPath) -> ParsedConfig {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| NormalizedPath::new_absolute("/"));

        let raw: RawConfig = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(err) => {
                return ParsedConfig {
                    diagnostics: vec![ConfigDiagnostic::error(
                        CODE_NO_INPUTS,
                        format!("failed to parse {config_path}: {err}"),
                    )],
                    ..ParsedConfig::default()
                };
            }
        };

        let mut diagnostics = Vec::new();
        let has_files_spec = raw.files.is_some();
        let has_include_spec = raw.include.is_some();

        let file_names: Vec<NormalizedPath> = raw
            .files
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|rel| NormalizedPath::new(rel, &config_dir))
            .collect();

        if has_files_spec && file_names.is_empty() {
            diagnostics.push(ConfigDiagnostic::error(
                CODE_EMPTY_FILES_LIST,
                format!("the 'files' list in {config_path} is empty"),
            ));
        } else if file_names.is_empty() && (has_files_spec || has_include_spec) {
            diagnostics.push(ConfigDiagnostic::error(
                CODE_NO_INPUTS,
                format!("no inputs were found in {config_path}"),
            ));
        }

        let mut wildcard_directories = BTreeMap::new();
        for pattern in raw.include.as_deref().unwrap_or_default() {
            let (dir, depth) = wildcard_base(pattern);
            let dir = if dir.is_empty() {
                config_dir.clone()
            } else {
                NormalizedPath::new(&dir, &config_dir)
            };
            wildcard_directories.entry(dir).or_insert(depth);
        }

        ParsedConfig {
            options: raw.compiler_options,
            file_names,
            wildcard_directories,
            has_files_spec,
            has_include_spec,
            has_exclude_spec: raw.exclude.is_some(),
            has_extends: raw.extends.is_some(),
            type_acquisition: raw.type_acquisition.unwrap_or_default(),
            compile_on_save: raw.compile_on_save.unwrap_or(false),
            diagnostics,
        }
    }
}

/// The literal directory prefix of an include pattern, and how deep a watch
/// on it must reach.
fn wildcard_base(pattern: &str) -> (String, WatchDepth) {
    let normalized = pattern.replace('\\', "/");
    let mut literal = Vec::new();
    let mut depth = WatchDepth::Recursive;
    for segment in normalized.split('/') {
        if segment.contains('*') || segment.contains('?') {
            // "*" matches one level; "**" and anything beyond need recursion.
            depth = if segment == "*" { WatchDepth::Shallow } else { WatchDepth::Recursive };
            break;
        }
        literal.push(segment);
    }
    (literal.join("/"), depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ParsedConfig {
        JsonConfigParser.parse(text, &NormalizedPath::new_absolute("/proj/tsconfig.json"))
    }

    #[test]
    fn files_resolve_against_the_config_directory() {
        let parsed = parse(r#"{"files": ["src/a.ts", "../shared/b.ts"]}"#);
        assert_eq!(
            parsed.file_names,
            vec![
                NormalizedPath::new_absolute("/proj/src/a.ts"),
                NormalizedPath::new_absolute("/shared/b.ts"),
            ]
        );
        assert!(parsed.has_files_spec);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn invalid_json_becomes_a_diagnostic_not_an_error() {
        let parsed = parse("{not json");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.file_names.is_empty());
    }

    #[test]
    fn empty_files_list_is_reported() {
        let parsed = parse(r#"{"files": []}"#);
        assert_eq!(parsed.diagnostics[0].code, CODE_EMPTY_FILES_LIST);
    }

    #[test]
    fn include_patterns_become_wildcard_directories() {
        let parsed = parse(r#"{"files": ["a.ts"], "include": ["src/**/*", "vendor/*"]}"#);
        let dirs: Vec<(&str, WatchDepth)> = parsed
            .wildcard_directories
            .iter()
            .map(|(dir, depth)| (dir.as_str(), *depth))
            .collect();
        assert_eq!(
            dirs,
            vec![
                ("/proj/src", WatchDepth::Recursive),
                ("/proj/vendor", WatchDepth::Shallow),
            ]
        );
    }

    #[test]
    fn compile_on_save_and_type_acquisition_parse() {
        let parsed = parse(
            r#"{
                "files": ["a.ts"],
                "compileOnSave": true,
                "typeAcquisition": {"enable": true, "include": ["node"]}
            }"#,
        );
        assert!(parsed.compile_on_save);
        assert_eq!(parsed.type_acquisition.enable, Some(true));
        assert_eq!(parsed.type_acquisition.include, vec!["node".to_string()]);
    }
}
