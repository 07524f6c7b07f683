use std::fmt;

use serde::{Deserialize, Serialize};

/// An absolute path with `/` separators and no `.`/`..` segments.
///
/// Every path entering the coordinator is normalized once, at the boundary;
/// internal tables never see raw client strings. Normalization is purely
/// lexical: symlinks are not resolved.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPath(String);

/// The key form of a [`NormalizedPath`]: case-folded when the host filesystem
/// is case-insensitive.
///
/// Two client spellings of the same on-disk file must land on the same
/// registry slot, so every lookup table is keyed by `CanonicalPath` while
/// display and host I/O keep the [`NormalizedPath`] spelling.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl NormalizedPath {
    /// Normalize `raw`, resolving it against `cwd` when relative.
    pub fn new(raw: &str, cwd: &NormalizedPath) -> NormalizedPath {
        let slashed = raw.replace('\\', "/");
        let joined = if is_rooted(&slashed) {
            slashed
        } else {
            format!("{}/{}", cwd.0, slashed)
        };
        NormalizedPath(collapse(&joined))
    }

    /// Wrap a string that is already absolute and slash-normalized.
    ///
    /// Dot segments are still collapsed so callers can build paths by
    /// concatenation without re-normalizing.
    pub fn new_absolute(raw: &str) -> NormalizedPath {
        debug_assert!(is_rooted(&raw.replace('\\', "/")), "path is not absolute: {raw}");
        NormalizedPath(collapse(&raw.replace('\\', "/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final component, or `""` for a root.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// The extension including the leading dot (`".ts"`), lowercased check is
    /// up to the caller.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').filter(|&idx| idx > 0).map(|idx| &name[idx..])
    }

    /// The containing directory. Returns `None` at a filesystem root (the
    /// point where an upward walk terminates).
    pub fn parent(&self) -> Option<NormalizedPath> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            // "/foo" -> "/", "/" -> no parent.
            return if self.0.len() > 1 {
                Some(NormalizedPath("/".to_string()))
            } else {
                None
            };
        }
        let prefix = &self.0[..idx];
        // Drive-letter roots: "c:/foo" -> "c:/", "c:/" -> no parent.
        if prefix.ends_with(':') {
            return if self.0.len() > idx + 1 {
                Some(NormalizedPath(format!("{prefix}/")))
            } else {
                None
            };
        }
        if self.0.ends_with('/') {
            // Already a root spelled with a trailing slash.
            return None;
        }
        Some(NormalizedPath(prefix.to_string()))
    }

    /// Append a single component.
    pub fn join(&self, component: &str) -> NormalizedPath {
        debug_assert!(!component.contains('/'), "join takes one component: {component}");
        if self.0.ends_with('/') {
            NormalizedPath(format!("{}{component}", self.0))
        } else {
            NormalizedPath(format!("{}/{component}", self.0))
        }
    }

    pub fn starts_with(&self, ancestor: &NormalizedPath) -> bool {
        if self.0 == ancestor.0 {
            return true;
        }
        let prefix = ancestor.0.strip_suffix('/').unwrap_or(&ancestor.0);
        self.0.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
    }

    /// Fold to the table-key form.
    pub fn canonicalize(&self, case_sensitive: bool) -> CanonicalPath {
        if case_sensitive {
            CanonicalPath(self.0.clone())
        } else {
            CanonicalPath(self.0.to_lowercase())
        }
    }
}

impl CanonicalPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_rooted(path: &str) -> bool {
    path.starts_with('/') || path.as_bytes().get(1) == Some(&b':')
}

/// Remove `.` and `..` segments and repeated separators. Never pops past the
/// root.
fn collapse(path: &str) -> String {
    let (root, rest) = if let Some(rest) = path.strip_prefix('/') {
        ("/".to_string(), rest)
    } else if path.as_bytes().get(1) == Some(&b':') {
        let drive = path[..2].to_string();
        (format!("{drive}/"), path[2..].trim_start_matches('/'))
    } else {
        (String::new(), path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        if root.is_empty() {
            ".".to_string()
        } else {
            root
        }
    } else {
        format!("{root}{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cwd() -> NormalizedPath {
        NormalizedPath::new_absolute("/home/user")
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let p = NormalizedPath::new("src/a.ts", &cwd());
        assert_eq!(p.as_str(), "/home/user/src/a.ts");
    }

    #[test]
    fn dot_segments_collapse() {
        let p = NormalizedPath::new("/a/b/../c/./d.ts", &cwd());
        assert_eq!(p.as_str(), "/a/c/d.ts");
    }

    #[test]
    fn backslashes_normalize() {
        let p = NormalizedPath::new(r"c:\proj\src\a.ts", &cwd());
        assert_eq!(p.as_str(), "c:/proj/src/a.ts");
    }

    #[test]
    fn parent_walk_terminates_at_root() {
        let mut p = NormalizedPath::new_absolute("/a/b/c.ts");
        let mut seen = Vec::new();
        while let Some(parent) = p.parent() {
            seen.push(parent.as_str().to_string());
            p = parent;
        }
        assert_eq!(seen, vec!["/a/b", "/a", "/"]);
    }

    #[test]
    fn drive_letter_parent_walk_terminates() {
        let mut p = NormalizedPath::new_absolute("c:/a/b.ts");
        let mut seen = Vec::new();
        while let Some(parent) = p.parent() {
            seen.push(parent.as_str().to_string());
            p = parent;
        }
        assert_eq!(seen, vec!["c:/a", "c:/"]);
    }

    #[test]
    fn file_name_and_extension() {
        let p = NormalizedPath::new_absolute("/a/b/lib.min.js");
        assert_eq!(p.file_name(), "lib.min.js");
        assert_eq!(p.extension(), Some(".js"));
        assert_eq!(NormalizedPath::new_absolute("/a/.hidden").extension(), None);
    }

    #[test]
    fn canonical_folds_case_only_when_insensitive() {
        let p = NormalizedPath::new_absolute("/A/B.TS");
        assert_eq!(p.canonicalize(false).as_str(), "/a/b.ts");
        assert_eq!(p.canonicalize(true).as_str(), "/A/B.TS");
    }

    #[test]
    fn starts_with_respects_component_boundaries() {
        let dir = NormalizedPath::new_absolute("/a/b");
        assert!(NormalizedPath::new_absolute("/a/b/c.ts").starts_with(&dir));
        assert!(!NormalizedPath::new_absolute("/a/bc/c.ts").starts_with(&dir));
        assert!(NormalizedPath::new_absolute("/a/x.ts").starts_with(&NormalizedPath::new_absolute("/")));
    }

    #[test]
    fn join_on_root_does_not_double_slash() {
        let root = NormalizedPath::new_absolute("/");
        assert_eq!(root.join("tsconfig.json").as_str(), "/tsconfig.json");
    }
}
