use std::collections::BTreeMap;

use arbor_core::NormalizedPath;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

/// One element of an exclusion template: literal text, or a 1-indexed
/// reference to a capture group of the rule's match regex.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ExcludeToken {
    Group(usize),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "match")]
    match_pattern: String,
    #[serde(default)]
    exclude: Option<Vec<Vec<ExcludeToken>>>,
    #[serde(default)]
    types: Option<Vec<String>>,
}

#[derive(Debug)]
struct SafeRule {
    name: String,
    pattern: Regex,
    exclude: Option<Vec<Vec<ExcludeToken>>>,
    types: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SafelistError {
    #[error("safelist is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("safelist rule {rule} has an invalid pattern: {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Result of filtering an external project declaration.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SafelistOutcome {
    /// Typings to acquire for the libraries that were recognized.
    pub typings: Vec<String>,
    /// Root files removed from the declaration.
    pub excluded: Vec<NormalizedPath>,
}

/// Rule-based exclusion of known third-party bundles from externally
/// declared projects.
///
/// Loaded from a JSON mapping of rule name to `{match, exclude?, types?}`;
/// all regexes are compiled case-insensitively. Rules apply in name order.
#[derive(Debug)]
pub struct Safelist {
    rules: Vec<SafeRule>,
}

impl Safelist {
    /// The default list shipped with the server. Hosts usually replace it
    /// via `load_safe_list`.
    pub fn builtin() -> Self {
        let text = r#"{
            "jquery": {
                "match": "jquery(-[\\d\\.]+)?(\\.intellisense)?(\\.min)?\\.js$",
                "types": ["jquery"]
            }
        }"#;
        Self::parse(text).expect("builtin safelist must parse")
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn parse(text: &str) -> Result<Self, SafelistError> {
        // BTreeMap keeps rule application order deterministic.
        let raw: BTreeMap<String, RawRule> = serde_json::from_str(text)?;
        let mut rules = Vec::with_capacity(raw.len());
        for (name, rule) in raw {
            let pattern = RegexBuilder::new(&rule.match_pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| SafelistError::Pattern { rule: name.clone(), source })?;
            rules.push(SafeRule {
                name,
                pattern,
                exclude: rule.exclude,
                types: rule.types.unwrap_or_default(),
            });
        }
        Ok(Self { rules })
    }

    /// Filter `root_files` in place, removing recognized third-party bundles
    /// and collecting the typings the matched rules inject.
    ///
    /// For each root matched by a rule the exclusion regexes are built by
    /// substituting the match's capture groups into the rule's exclusion
    /// templates; a rule without exclusions excludes exactly the matched
    /// file. The union of exclusion regexes is applied to the whole list.
    pub fn apply(&self, root_files: &mut Vec<NormalizedPath>) -> SafelistOutcome {
        let mut typings: Vec<String> = Vec::new();
        let mut exclude_patterns: Vec<String> = Vec::new();

        for root in root_files.iter() {
            for rule in &self.rules {
                let Some(captures) = rule.pattern.captures(root.as_str()) else {
                    continue;
                };
                for typing in &rule.types {
                    if !typings.contains(typing) {
                        typings.push(typing.clone());
                    }
                }
                match &rule.exclude {
                    Some(templates) => {
                        for template in templates {
                            exclude_patterns
                                .push(expand_exclusion(&rule.name, template, &captures));
                        }
                    }
                    None => exclude_patterns.push(regex::escape(root.as_str())),
                }
            }
        }

        let exclude_regexes: Vec<Regex> = exclude_patterns
            .iter()
            .filter_map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| {
                        tracing::warn!(%pattern, %err, "skipping unbuildable exclusion pattern");
                        err
                    })
                    .ok()
            })
            .collect();

        if exclude_regexes.is_empty() {
            return SafelistOutcome { typings, excluded: Vec::new() };
        }

        let mut excluded = Vec::new();
        root_files.retain(|root| {
            if exclude_regexes.iter().any(|re| re.is_match(root.as_str())) {
                excluded.push(root.clone());
                false
            } else {
                true
            }
        });

        SafelistOutcome { typings, excluded }
    }
}

fn expand_exclusion(rule_name: &str, template: &[ExcludeToken], captures: &regex::Captures) -> String {
    let mut out = String::new();
    for token in template {
        match token {
            ExcludeToken::Text(text) => out.push_str(text),
            ExcludeToken::Group(index) => match captures.get(*index) {
                Some(group) => out.push_str(&regex::escape(group.as_str())),
                None => {
                    // Grace case for rules that reference a group the match
                    // did not produce.
                    tracing::warn!(
                        rule = rule_name,
                        group = index,
                        "exclusion references a capture group the match did not bind"
                    );
                    out.push_str("\\*");
                }
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roots(names: &[&str]) -> Vec<NormalizedPath> {
        names.iter().map(|n| NormalizedPath::new_absolute(n)).collect()
    }

    #[test]
    fn builtin_jquery_rule_strips_the_bundle() {
        let safelist = Safelist::builtin();
        let mut files = roots(&["/proj/lib/jquery-1.10.2.min.js", "/proj/app.js"]);
        let outcome = safelist.apply(&mut files);
        assert_eq!(files, roots(&["/proj/app.js"]));
        assert_eq!(outcome.typings, vec!["jquery".to_string()]);
        assert_eq!(outcome.excluded, roots(&["/proj/lib/jquery-1.10.2.min.js"]));
    }

    #[test]
    fn rule_without_exclusions_excludes_only_the_matched_file() {
        let safelist = Safelist::parse(
            r#"{"jquery": {"match": "jquery.*\\.js$", "types": ["jquery"]}}"#,
        )
        .unwrap();
        let mut files = roots(&["/p/jquery.min.js", "/p/jquery-ui.css.js.map.js", "/p/app.js"]);
        let outcome = safelist.apply(&mut files);
        // Both jquery files matched, so both were individually excluded.
        assert_eq!(files, roots(&["/p/app.js"]));
        assert_eq!(outcome.typings, vec!["jquery".to_string()]);
    }

    #[test]
    fn capture_groups_substitute_into_exclusion_templates() {
        let safelist = Safelist::parse(
            r#"{
                "bundles": {
                    "match": "/(vendor-[a-z]+)/index\\.js$",
                    "exclude": [["/", 1, "/"]]
                }
            }"#,
        )
        .unwrap();
        let mut files = roots(&[
            "/p/vendor-maps/index.js",
            "/p/vendor-maps/extra.js",
            "/p/src/index.js",
        ]);
        safelist.apply(&mut files);
        assert_eq!(files, roots(&["/p/src/index.js"]));
    }

    #[test]
    fn missing_capture_group_degrades_to_literal_star() {
        let safelist = Safelist::parse(
            r#"{"bad": {"match": "lib\\.js$", "exclude": [["dir/", 3]]}}"#,
        )
        .unwrap();
        let mut files = roots(&["/p/lib.js", "/p/dir/*"]);
        safelist.apply(&mut files);
        // The degraded pattern `dir/\*` only matches a literal asterisk.
        assert_eq!(files, roots(&["/p/lib.js"]));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let safelist = Safelist::builtin();
        let mut files = roots(&["/p/JQUERY.MIN.JS"]);
        let outcome = safelist.apply(&mut files);
        assert!(files.is_empty());
        assert_eq!(outcome.typings, vec!["jquery".to_string()]);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(Safelist::parse("not json"), Err(SafelistError::Json(_))));
        assert!(matches!(
            Safelist::parse(r#"{"r": {"match": "("}}"#),
            Err(SafelistError::Pattern { .. })
        ));
    }
}
