//! Line-oriented definition finding for the languages the scan index knows.
//!
//! This is heuristic: definitions are recognized by their header line and
//! their extent by indentation (Python) or brace balance (everything else).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// How far below a header the opening brace may appear.
const MAX_HEADER_LINES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Rust,
    JavaScript,
    Go,
    /// Java, C, C++, C#, Kotlin, Swift, PHP, Scala
    CFamily,
}

impl Language {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" | "pyi" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => Some(Language::JavaScript),
            "go" => Some(Language::Go),
            "java" | "c" | "h" | "cc" | "cpp" | "cxx" | "hpp" | "cs" | "kt" | "kts" | "swift"
            | "php" | "scala" => Some(Language::CFamily),
            _ => None,
        }
    }

    fn patterns(self) -> &'static [Regex] {
        match self {
            Language::Python => &PYTHON,
            Language::Rust => &RUST,
            Language::JavaScript => &JAVASCRIPT,
            Language::Go => &GO,
            Language::CFamily => &C_FAMILY,
        }
    }

    /// Name defined by `line`, if it is a definition header.
    pub fn definition_name(self, line: &str) -> Option<String> {
        self.patterns().iter().find_map(|re| {
            let name = re.captures(line)?.name("name")?.as_str();
            (!CONTROL_KEYWORDS.contains(&name)).then(|| name.to_string())
        })
    }
}

/// A definition found in a file. Lines are zero-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Definition {
    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }
}

/// Every definition in `lines`, in order of appearance.
pub fn definitions(language: Language, lines: &[&str]) -> Vec<Definition> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(start, line)| {
            let name = language.definition_name(line)?;
            let end = match language {
                Language::Python => indented_block_end(lines, start),
                _ => braced_block_end(lines, start),
            };
            Some(Definition { name, start, end })
        })
        .collect()
}

/// Innermost definition containing `line`.
pub fn innermost(defs: &[Definition], line: usize) -> Option<&Definition> {
    defs.iter()
        .filter(|d| d.contains(line))
        .min_by_key(|d| (d.end - d.start, std::cmp::Reverse(d.start)))
}

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "catch", "return", "match", "new", "sizeof", "do",
    "try", "using", "throw", "synchronized", "foreach", "elif", "loop",
];

static PYTHON: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^\s*(?:async\s+)?(?:def|class)\s+(?P<name>[A-Za-z_]\w*)").unwrap(),
    ]
});

static RUST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|const|unsafe|default)\s+)*(?:extern\s+"[^"]*"\s+)?(?:fn|struct|enum|trait|mod|union|type)\s+(?P<name>[A-Za-z_]\w*)"#,
        )
        .unwrap(),
        Regex::new(r"^\s*macro_rules!\s*(?P<name>[A-Za-z_]\w*)").unwrap(),
        Regex::new(
            r"^\s*(?:unsafe\s+)?impl\b(?:\s*<[^{]*?>)?\s+(?:[\w:<>, &']+?\s+for\s+)?(?P<name>[A-Za-z_]\w*)",
        )
        .unwrap(),
    ]
});

static JAVASCRIPT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\*?|class|interface|enum|namespace)\s+(?P<name>[A-Za-z_$][\w$]*)",
        )
        .unwrap(),
        Regex::new(
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)",
        )
        .unwrap(),
        Regex::new(
            r"^\s*(?:(?:public|private|protected|static|async|get|set|readonly|override)\s+)*(?P<name>[A-Za-z_$][\w$]*)\s*\([^;]*\)\s*(?::\s*[^={;]+)?\{\s*$",
        )
        .unwrap(),
    ]
});

static GO: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)").unwrap(),
        Regex::new(r"^type\s+(?P<name>[A-Za-z_]\w*)\s+(?:struct|interface)\b").unwrap(),
    ]
});

static C_FAMILY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(
            r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|sealed|partial|open|data)\s+)*(?:class|struct|interface|enum|namespace|object|record|trait)\s+(?P<name>[A-Za-z_]\w*)",
        )
        .unwrap(),
        Regex::new(r"^\s*(?:(?:public|private|protected|internal|static|open|override|suspend)\s+)*(?:fun|func|function|def)\s+(?P<name>[A-Za-z_]\w*)").unwrap(),
        Regex::new(
            r"^\s*(?:[\w<>\[\],*&:~]+\s+)+\**(?P<name>[A-Za-z_~]\w*)\s*\([^;]*$",
        )
        .unwrap(),
    ]
});

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Last line of a Python block whose header starts at `start`.
fn indented_block_end(lines: &[&str], start: usize) -> usize {
    let indent = indent_of(lines[start]);

    // The signature may span several lines until its parentheses close.
    let mut header_end = start;
    let mut depth: i32 = 0;
    for (i, line) in lines.iter().enumerate().skip(start).take(MAX_HEADER_LINES) {
        depth += paren_balance(line);
        header_end = i;
        if depth <= 0 && line.trim_end().ends_with(':') {
            break;
        }
    }

    let mut end = header_end;
    for (i, line) in lines.iter().enumerate().skip(header_end + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= indent {
            break;
        }
        end = i;
    }
    end
}

/// Last line of a brace-delimited block whose header starts at `start`.
/// Headers that end in `;` before any `{` are bodiless and span one line.
fn braced_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i32 = 0;
    let mut opened = false;
    for (i, line) in lines.iter().enumerate().skip(start) {
        for c in code_chars(line) {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => {
                    depth -= 1;
                    if opened && depth <= 0 {
                        return i;
                    }
                }
                ';' if !opened => return i,
                _ => {}
            }
        }
        if !opened && i >= start + MAX_HEADER_LINES {
            return start;
        }
    }
    if opened {
        lines.len().saturating_sub(1)
    } else {
        start
    }
}

fn paren_balance(line: &str) -> i32 {
    code_chars(line).fold(0, |acc, c| match c {
        '(' | '[' | '{' => acc + 1,
        ')' | ']' | '}' => acc - 1,
        _ => acc,
    })
}

/// Characters of `line` outside string literals and trailing line comments.
fn code_chars(line: &str) -> impl Iterator<Item = char> + '_ {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = '\0';
    let mut done = false;
    line.chars().filter(move |&c| {
        if done {
            return false;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            return false;
        }
        let keep = match c {
            '"' | '`' => {
                quote = Some(c);
                false
            }
            '#' if prev == '\0' || prev.is_whitespace() => {
                // Python comment; harmless elsewhere since only braces matter.
                done = true;
                false
            }
            '/' if prev == '/' => {
                done = true;
                false
            }
            _ => true,
        };
        prev = c;
        keep
    })
}
