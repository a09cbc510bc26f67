use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::blob::{ContextBlob, ContextEntry, EntryKind};
use crate::config::ContextConfig;
use crate::index::{SymbolContext, UsageSite};
use crate::repo::resolve_in_tree;

/// Key under which a symbol is attached at most once per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolIdentity {
    pub path: String,
    pub name: Option<String>,
    pub start_line: Option<usize>,
}

/// Accumulates the context of one review run.
///
/// Files and symbols are attached at most once; usage sites are capped
/// per symbol. Everything is rendered in the order it was added, with the
/// diff always first.
pub struct ContextAssembler {
    root: PathBuf,
    max_file_lines: Option<usize>,
    max_usages_per_symbol: usize,
    blob: ContextBlob,
    has_diff: bool,
    seen_files: HashSet<String>,
    seen_symbols: HashSet<SymbolIdentity>,
    touched_symbols: BTreeSet<String>,
    usage_counts: HashMap<String, usize>,
}

impl ContextAssembler {
    pub fn new(root: impl Into<PathBuf>, options: &ContextConfig) -> Self {
        Self {
            root: root.into(),
            max_file_lines: options.max_file_lines,
            max_usages_per_symbol: options.max_usages_per_symbol,
            blob: ContextBlob::new(),
            has_diff: false,
            seen_files: HashSet::new(),
            seen_symbols: HashSet::new(),
            touched_symbols: BTreeSet::new(),
            usage_counts: HashMap::new(),
        }
    }

    /// Attach the raw diff ahead of every other entry. Only the first call counts.
    pub fn add_diff(&mut self, diff_text: &str) -> bool {
        if self.has_diff {
            warn!("diff already attached; ignoring second diff");
            return false;
        }
        self.has_diff = true;
        self.blob.push_front(ContextEntry {
            kind: EntryKind::Diff,
            path: None,
            label: "Diff".to_string(),
            text: diff_text.to_string(),
        });
        true
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.seen_files.contains(path)
    }

    /// Attach the content of `path` (relative to the tree root) unless it was
    /// attached before. Missing or unreadable files are skipped; the diff
    /// stays the source of truth for them.
    pub fn add_file(&mut self, path: &str) -> bool {
        if self.has_file(path) {
            return false;
        }
        let Some(full) = resolve_in_tree(&self.root, path) else {
            debug!(path, "changed file missing or outside the checkout; diff will be primary source");
            return false;
        };
        if !full.is_file() {
            debug!(path, "changed file not found on disk; diff will be primary source");
            return false;
        }
        let content = match std::fs::read_to_string(&full) {
            Ok(content) => content,
            Err(e) => {
                warn!(path, error = %e, "failed to read changed file; diff will be primary source");
                return false;
            }
        };

        let text = match self.max_file_lines {
            Some(max) => truncate_lines(&content, max),
            None => content,
        };
        self.blob.push(ContextEntry {
            kind: EntryKind::File,
            path: Some(path.to_string()),
            label: format!("File: {}", path),
            text,
        });
        self.seen_files.insert(path.to_string());
        debug!(path, "added full content of changed file");
        true
    }

    /// Attach the source of a symbol enclosing a change that starts around
    /// `changed_line`, unless the same `(path, name, start_line)` is already in.
    pub fn add_symbol(&mut self, path: &str, symbol: &SymbolContext, changed_line: usize) -> bool {
        if symbol.code.is_empty() {
            return false;
        }
        let identity = SymbolIdentity {
            path: path.to_string(),
            name: symbol.name.clone(),
            start_line: symbol.start_line,
        };
        if !self.seen_symbols.insert(identity) {
            return false;
        }

        let name = symbol.name.as_deref().unwrap_or("Unnamed Symbol");
        let span = |line: Option<usize>| line.map_or_else(|| "?".to_string(), |l| l.to_string());
        let label = format!(
            "Context: Symbol '{}' in {} (lines {}-{}) related to changes starting around line {} in the new file.",
            name,
            path,
            span(symbol.start_line),
            span(symbol.end_line),
            changed_line
        );
        self.blob.push(ContextEntry {
            kind: EntryKind::Symbol,
            path: Some(path.to_string()),
            label,
            text: symbol.code.clone(),
        });
        if let Some(name) = &symbol.name {
            self.touched_symbols.insert(name.clone());
        }
        debug!(symbol = name, path, "added parent symbol context");
        true
    }

    /// Names of every symbol attached so far, for usage expansion.
    pub fn touched_symbols(&self) -> impl Iterator<Item = &str> {
        self.touched_symbols.iter().map(String::as_str)
    }

    /// Offer the next reference site of `symbol`, in lookup order. Only the
    /// first few sites offered per symbol are considered; those without a
    /// file or snippet are skipped but still use up their slot.
    pub fn add_usage(&mut self, symbol: &str, site: &UsageSite) -> bool {
        let count = self.usage_counts.entry(symbol.to_string()).or_insert(0);
        if *count >= self.max_usages_per_symbol {
            return false;
        }
        *count += 1;
        let (Some(file), Some(snippet)) = (site.file.as_deref(), site.snippet.as_deref()) else {
            return false;
        };

        let line = site
            .line_number
            .map_or_else(|| "?".to_string(), |l| l.to_string());
        self.blob.push(ContextEntry {
            kind: EntryKind::Usage,
            path: Some(file.to_string()),
            label: format!("Usage of {} in {}", symbol, file),
            text: format!("# Usage of `{}` at {}:{}\n{}", symbol, file, line, snippet.trim_end()),
        });
        true
    }

    pub fn blob(&self) -> &ContextBlob {
        &self.blob
    }

    pub fn render(&self) -> String {
        self.blob.render()
    }

}

fn truncate_lines(content: &str, max: usize) -> String {
    let total = content.lines().count();
    if total <= max {
        return content.to_string();
    }
    let mut kept: String = content
        .lines()
        .take(max)
        .flat_map(|line| [line, "\n"])
        .collect();
    kept.push_str(&format!("... [{} more lines truncated]\n", total - max));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::testing::{site, symbol};

    fn assembler(root: &Path) -> ContextAssembler {
        ContextAssembler::new(root, &ContextConfig::default())
    }

    #[test]
    fn test_add_file_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "a = 1\n").unwrap();
        let mut ctx = assembler(dir.path());
        assert!(ctx.add_file("a.py"));
        assert!(!ctx.add_file("a.py"));
        assert_eq!(ctx.blob().len(), 1);
        assert_eq!(ctx.blob().entries()[0].kind, EntryKind::File);
    }

    #[test]
    fn test_add_file_skips_missing_and_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = assembler(dir.path());
        assert!(!ctx.add_file("nope.py"));
        assert!(!ctx.add_file("../outside.py"));
        assert!(!ctx.add_file("/etc/hostname"));
        assert!(ctx.blob().is_empty());
        assert!(!ctx.has_file("nope.py"));
    }

    #[test]
    fn test_add_file_truncates_long_files() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=10).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(dir.path().join("long.txt"), body).unwrap();
        let options = ContextConfig {
            max_file_lines: Some(3),
            ..ContextConfig::default()
        };
        let mut ctx = ContextAssembler::new(dir.path(), &options);
        ctx.add_file("long.txt");
        assert_eq!(
            ctx.blob().entries()[0].text,
            "line 1\nline 2\nline 3\n... [7 more lines truncated]\n"
        );
    }

    #[test]
    fn test_add_diff_goes_first_and_only_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "a = 1\n").unwrap();
        let mut ctx = assembler(dir.path());
        ctx.add_file("a.py");
        assert!(ctx.add_diff("+a = 1"));
        assert!(!ctx.add_diff("+b = 2"));
        let kinds: Vec<EntryKind> = ctx.blob().entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Diff, EntryKind::File]);
    }

    #[test]
    fn test_add_symbol_dedups_on_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = assembler(dir.path());
        let f = symbol("test", "def test(): pass", 5, 5);
        assert!(ctx.add_symbol("t.py", &f, 10));
        assert!(!ctx.add_symbol("t.py", &f, 12));
        // Same name elsewhere is a different symbol.
        assert!(ctx.add_symbol("u.py", &f, 10));
        assert_eq!(ctx.blob().len(), 2);
        assert_eq!(
            ctx.blob().entries()[0].label,
            "Context: Symbol 'test' in t.py (lines 5-5) related to changes starting around line 10 in the new file."
        );
        assert_eq!(ctx.touched_symbols().collect::<Vec<_>>(), vec!["test"]);
    }

    #[test]
    fn test_add_symbol_tolerates_partial_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = assembler(dir.path());
        let anonymous = SymbolContext {
            name: None,
            code: "{ block }".to_string(),
            start_line: None,
            end_line: None,
        };
        assert!(ctx.add_symbol("x.js", &anonymous, 3));
        assert!(ctx.blob().entries()[0]
            .label
            .starts_with("Context: Symbol 'Unnamed Symbol' in x.js (lines ?-?)"));
        assert_eq!(ctx.touched_symbols().count(), 0);

        let empty = SymbolContext {
            code: String::new(),
            ..anonymous
        };
        assert!(!ctx.add_symbol("y.js", &empty, 3));
    }

    #[test]
    fn test_add_usage_caps_per_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let options = ContextConfig {
            max_usages_per_symbol: 2,
            ..ContextConfig::default()
        };
        let mut ctx = ContextAssembler::new(dir.path(), &options);
        assert!(ctx.add_usage("f", &site("a.py", 1, "f()  ")));
        assert!(ctx.add_usage("f", &site("b.py", 2, "f()")));
        assert!(!ctx.add_usage("f", &site("c.py", 3, "f()")));
        assert!(ctx.add_usage("g", &site("c.py", 3, "g()")));
        assert_eq!(ctx.blob().entries()[0].text, "# Usage of `f` at a.py:1\nf()");
    }

    #[test]
    fn test_unusable_sites_count_toward_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let options = ContextConfig {
            max_usages_per_symbol: 2,
            ..ContextConfig::default()
        };
        let mut ctx = ContextAssembler::new(dir.path(), &options);
        let no_file = UsageSite {
            file: None,
            line_number: Some(1),
            snippet: Some("f()".to_string()),
        };
        assert!(!ctx.add_usage("f", &no_file));
        assert!(ctx.add_usage("f", &site("a.py", 2, "f()")));
        assert!(!ctx.add_usage("f", &site("b.py", 3, "f()")));
        assert_eq!(ctx.blob().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_add_file_skips_symlink_leaving_the_tree() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("id_rsa"), "PRIVATE KEY").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("id_rsa"), dir.path().join("leak.py")).unwrap();

        let mut ctx = assembler(dir.path());
        assert!(!ctx.add_file("leak.py"));
        assert!(ctx.blob().is_empty());
    }

    #[test]
    fn test_add_usage_requires_file_and_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = assembler(dir.path());
        let no_snippet = UsageSite {
            file: Some("a.py".to_string()),
            line_number: Some(1),
            snippet: None,
        };
        assert!(!ctx.add_usage("f", &no_snippet));
        assert!(ctx.blob().is_empty());
    }
}
