use serde::{Deserialize, Serialize};

/// A replace-range edit against an open buffer, in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl TextChange {
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self { start, end, new_text: new_text.into() }
    }

    /// Apply a batch of edits to `text`.
    ///
    /// Edits are applied in reverse order of the slice so that earlier spans
    /// keep their coordinates; clients produce batches under that contract.
    pub fn apply_all(text: &mut String, changes: &[TextChange]) {
        for change in changes.iter().rev() {
            let end = change.end.min(text.len());
            let start = change.start.min(end);
            text.replace_range(start..end, &change.new_text);
        }
    }
}
