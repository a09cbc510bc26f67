use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use regex::Regex;
use tracing::debug;

use super::lang::{self, Language};
use super::{IndexError, StructureIndex, SymbolContext, UsageSite};
use crate::repo::resolve_in_tree;

/// Files larger than this are not searched for usages.
const MAX_SEARCH_FILE_BYTES: u64 = 1024 * 1024;

/// Upper bound on the usage sites collected for one symbol.
const MAX_USAGE_SITES: usize = 200;

/// Structure index that scans the checked-out tree on demand.
///
/// Nothing is precomputed: each lookup reads the files it needs.
pub struct ScanIndex {
    root: PathBuf,
}

impl ScanIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: &str) -> Result<String, IndexError> {
        let full = resolve_in_tree(&self.root, path).ok_or_else(|| IndexError::NotInTree {
            path: path.to_string(),
        })?;
        std::fs::read_to_string(&full).map_err(|source| IndexError::Io { path: full, source })
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl StructureIndex for ScanIndex {
    fn symbol_at(
        &self,
        path: &str,
        zero_based_line: usize,
    ) -> Result<Option<SymbolContext>, IndexError> {
        let Some(language) = Language::from_path(Path::new(path)) else {
            return Ok(None);
        };
        let source = self.read(path)?;
        let lines: Vec<&str> = source.lines().collect();
        if zero_based_line >= lines.len() {
            return Err(IndexError::LineOutOfRange {
                path: path.to_string(),
                line: zero_based_line,
                len: lines.len(),
            });
        }

        let defs = lang::definitions(language, &lines);
        Ok(lang::innermost(&defs, zero_based_line).map(|def| SymbolContext {
            name: Some(def.name.clone()),
            code: lines[def.start..=def.end].join("\n"),
            start_line: Some(def.start + 1),
            end_line: Some(def.end + 1),
        }))
    }

    fn usages(&self, symbol: &str) -> Result<Vec<UsageSite>, IndexError> {
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(symbol))).map_err(|e| {
            IndexError::Search {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        })?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut sites = Vec::new();
        'files: for entry in walker.flatten() {
            if entry.file_type().is_none_or(|ft| !ft.is_file()) {
                continue;
            }
            if entry
                .metadata()
                .is_ok_and(|m| m.len() > MAX_SEARCH_FILE_BYTES)
            {
                continue;
            }
            // Binary or otherwise unreadable files are not sources.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let language = Language::from_path(entry.path());
            let file = self.relative(entry.path());

            for (i, line) in content.lines().enumerate() {
                if !pattern.is_match(line) {
                    continue;
                }
                let is_definition = language
                    .and_then(|l| l.definition_name(line))
                    .is_some_and(|name| name == symbol);
                if is_definition {
                    continue;
                }
                sites.push(UsageSite {
                    file: Some(file.clone()),
                    line_number: Some(i + 1),
                    snippet: Some(line.trim_end().to_string()),
                });
                if sites.len() >= MAX_USAGE_SITES {
                    break 'files;
                }
            }
        }

        debug!(symbol, sites = sites.len(), "scanned for usages");
        Ok(sites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(
            root.join("pkg/calc.py"),
            "def add(a, b):\n    total = a + b\n    return total\n\n\ndef double(x):\n    return add(x, x)\n",
        )
        .unwrap();
        fs::write(
            root.join("main.py"),
            "from pkg.calc import add\n\nprint(add(1, 2))\nprint(addition)\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_symbol_at_returns_enclosing_function() {
        let dir = tree();
        let index = ScanIndex::new(dir.path());
        let symbol = index.symbol_at("pkg/calc.py", 1).unwrap().unwrap();
        assert_eq!(symbol.name.as_deref(), Some("add"));
        assert_eq!(symbol.start_line, Some(1));
        assert_eq!(symbol.end_line, Some(3));
        assert_eq!(symbol.code, "def add(a, b):\n    total = a + b\n    return total");
    }

    #[test]
    fn test_symbol_at_top_level_line_is_none() {
        let dir = tree();
        let index = ScanIndex::new(dir.path());
        assert_eq!(index.symbol_at("main.py", 2).unwrap(), None);
    }

    #[test]
    fn test_symbol_at_unknown_language_is_none() {
        let dir = tree();
        fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
        let index = ScanIndex::new(dir.path());
        assert_eq!(index.symbol_at("notes.txt", 0).unwrap(), None);
    }

    #[test]
    fn test_symbol_at_failures() {
        let dir = tree();
        let index = ScanIndex::new(dir.path());
        assert!(matches!(
            index.symbol_at("missing.py", 0),
            Err(IndexError::NotInTree { .. })
        ));
        assert!(matches!(
            index.symbol_at("main.py", 99),
            Err(IndexError::LineOutOfRange { len: 4, .. })
        ));
        fs::create_dir(dir.path().join("folder.py")).unwrap();
        assert!(matches!(
            index.symbol_at("folder.py", 0),
            Err(IndexError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_leaving_the_tree_are_not_read() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.py"), "def add(a, b):\n    return 'leaked'\n").unwrap();
        let dir = tree();
        std::os::unix::fs::symlink(outside.path().join("secret.py"), dir.path().join("leak.py")).unwrap();
        let index = ScanIndex::new(dir.path());

        assert!(matches!(
            index.symbol_at("leak.py", 0),
            Err(IndexError::NotInTree { .. })
        ));
        let sites = index.usages("add").unwrap();
        assert!(sites.iter().all(|s| s.file.as_deref() != Some("leak.py")));
    }

    #[test]
    fn test_usages_skip_definition_and_partial_words() {
        let dir = tree();
        let index = ScanIndex::new(dir.path());
        let sites = index.usages("add").unwrap();
        let found: Vec<(String, usize)> = sites
            .iter()
            .map(|s| (s.file.clone().unwrap(), s.line_number.unwrap()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("main.py".to_string(), 1),
                ("main.py".to_string(), 3),
                ("pkg/calc.py".to_string(), 7),
            ]
        );
        assert_eq!(sites[2].snippet.as_deref(), Some("    return add(x, x)"));
    }
}
