use serde::{Deserialize, Serialize};

use crate::NormalizedPath;

/// Classification of a source file, as reported by the client or derived
/// from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Unknown,
    Js,
    Jsx,
    Ts,
    Tsx,
    /// Externally declared files whose bytes mix source with content opaque
    /// to the compiler. Never watched on disk.
    External,
}

impl ScriptKind {
    pub fn from_file_name(name: &str) -> ScriptKind {
        let lower = name.to_lowercase();
        if lower.ends_with(".tsx") {
            ScriptKind::Tsx
        } else if lower.ends_with(".ts") {
            ScriptKind::Ts
        } else if lower.ends_with(".jsx") {
            ScriptKind::Jsx
        } else if lower.ends_with(".js") {
            ScriptKind::Js
        } else {
            ScriptKind::Unknown
        }
    }
}

impl NormalizedPath {
    /// Whether this file has a TypeScript extension (`.ts`, `.tsx`, `.d.ts`).
    ///
    /// The size-limit admission policy only charges files that do *not* pass
    /// this test.
    pub fn has_typescript_extension(&self) -> bool {
        let lower = self.file_name().to_lowercase();
        lower.ends_with(".ts") || lower.ends_with(".tsx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(ScriptKind::from_file_name("a.ts"), ScriptKind::Ts);
        assert_eq!(ScriptKind::from_file_name("a.TSX"), ScriptKind::Tsx);
        assert_eq!(ScriptKind::from_file_name("a.jsx"), ScriptKind::Jsx);
        assert_eq!(ScriptKind::from_file_name("jquery.min.js"), ScriptKind::Js);
        assert_eq!(ScriptKind::from_file_name("a.html"), ScriptKind::Unknown);
    }

    #[test]
    fn typescript_extension_covers_declarations() {
        assert!(NormalizedPath::new_absolute("/a/b.d.ts").has_typescript_extension());
        assert!(NormalizedPath::new_absolute("/a/b.tsx").has_typescript_extension());
        assert!(!NormalizedPath::new_absolute("/a/b.js").has_typescript_extension());
    }
}
