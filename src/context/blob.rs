use std::fmt::Write as _;
use tracing::trace;

/// What a context entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// The raw PR diff
    Diff,
    /// Full (or truncated) content of a changed file
    File,
    /// Source of the symbol enclosing a changed region
    Symbol,
    /// One reference site of a touched symbol
    Usage,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Diff => write!(f, "diff"),
            EntryKind::File => write!(f, "file"),
            EntryKind::Symbol => write!(f, "symbol"),
            EntryKind::Usage => write!(f, "usage"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub kind: EntryKind,
    /// File the text came from; `None` for the diff
    pub path: Option<String>,
    /// Heading shown above the text
    pub label: String,
    pub text: String,
}

fn trace_entry(entry: &ContextEntry) {
    trace!(
        kind = %entry.kind,
        path = entry.path.as_deref().unwrap_or("-"),
        chars = entry.text.len(),
        "context entry added"
    );
}

/// Ordered, append-only sequence of context entries.
#[derive(Debug, Default)]
pub struct ContextBlob {
    entries: Vec<ContextEntry>,
}

impl ContextBlob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ContextEntry) {
        trace_entry(&entry);
        self.entries.push(entry);
    }

    /// Put `entry` ahead of everything already appended.
    pub fn push_front(&mut self, entry: ContextEntry) {
        trace_entry(&entry);
        self.entries.insert(0, entry);
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenate every entry in insertion order.
    pub fn render(&self) -> String {
        let capacity = self
            .entries
            .iter()
            .map(|e| e.label.len() + e.text.len() + 32)
            .sum();
        let mut out = String::with_capacity(capacity);
        for entry in &self.entries {
            let fence = if entry.kind == EntryKind::Diff { "diff" } else { "" };
            let _ = writeln!(out, "## {}", entry.label);
            let _ = writeln!(out, "```{}", fence);
            out.push_str(entry.text.trim_end_matches('\n'));
            out.push_str("\n```\n\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EntryKind, label: &str, text: &str) -> ContextEntry {
        ContextEntry {
            kind,
            path: None,
            label: label.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_render_keeps_insertion_order() {
        let mut blob = ContextBlob::new();
        blob.push(entry(EntryKind::File, "File: a.py", "a = 1\n"));
        blob.push(entry(EntryKind::Symbol, "Symbol f", "def f(): pass"));
        blob.push_front(entry(EntryKind::Diff, "Diff", "+a = 1"));

        let rendered = blob.render();
        let diff_at = rendered.find("## Diff").unwrap();
        let file_at = rendered.find("## File: a.py").unwrap();
        let symbol_at = rendered.find("## Symbol f").unwrap();
        assert!(diff_at < file_at && file_at < symbol_at);
        assert!(rendered.starts_with("## Diff\n```diff\n+a = 1\n```\n\n"));
        assert!(rendered.contains("```\na = 1\n```"));
    }

    #[test]
    fn test_render_is_repeatable() {
        let mut blob = ContextBlob::new();
        blob.push(entry(EntryKind::Usage, "Usage", "f()"));
        assert_eq!(blob.render(), blob.render());
        assert_eq!(blob.len(), 1);
    }

    #[test]
    fn test_empty_blob_renders_empty() {
        assert!(ContextBlob::new().render().is_empty());
        assert!(ContextBlob::new().is_empty());
    }

    #[test]
    fn test_entry_kind_display() {
        assert_eq!(EntryKind::Diff.to_string(), "diff");
        assert_eq!(EntryKind::Usage.to_string(), "usage");
    }
}
