use super::types::{ChangeRecord, Hunk, LineChange};
use super::DiffError;

const NULL_DEVICE: &str = "/dev/null";

/// Parse a unified diff string into one ChangeRecord per file section.
///
/// Accepts both `git diff` output (sections start with `diff --git a/.. b/..`)
/// and plain unified diffs (sections start with a `---`/`+++` pair).
///
/// New files have: `--- /dev/null`
/// Deleted files have: `+++ /dev/null`
///
/// Hunks start with: @@ -{old_start},{old_count} +{new_start},{new_count} @@
/// A bare `@@` header is accepted too; its lines are numbered from 1.
///
/// Lines are prefixed with:
///   '+' for additions
///   '-' for deletions
///   ' ' for context (unchanged)
///
/// Sections that never name a path are dropped, as are hunk lines that
/// appear before any file header. A malformed hunk range is an error.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<ChangeRecord>, DiffError> {
    if raw_diff.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut current_file: Option<ChangeRecord> = None;
    let mut current_hunk: Option<HunkCursor> = None;

    let finish_hunk = |file: &mut Option<ChangeRecord>, hunk: &mut Option<HunkCursor>| {
        if let (Some(file), Some(cursor)) = (file.as_mut(), hunk.take()) {
            file.hunks.push(cursor.hunk);
        }
    };

    let finish_file =
        |files: &mut Vec<ChangeRecord>, file: &mut Option<ChangeRecord>, hunk: &mut Option<HunkCursor>| {
            finish_hunk(file, hunk);
            if let Some(mut file) = file.take() {
                if file.old_path.is_none() && file.new_path.is_none() {
                    return;
                }
                file.is_removed = file.is_removed
                    || file.new_path.as_deref() == Some(NULL_DEVICE)
                    || (file.old_path.is_some() && file.new_path.is_none());
                if file.new_path.as_deref() == Some(NULL_DEVICE) {
                    file.new_path = None;
                }
                if file.old_path.as_deref() == Some(NULL_DEVICE) {
                    file.old_path = None;
                }
                files.push(file);
            }
        };

    let mut lines = raw_diff.lines().peekable();
    while let Some(line) = lines.next() {
        // Lines still owed to a hunk with known counts are content, even when
        // they happen to look like headers (e.g. a removed line "-- x").
        if let Some(cursor) = current_hunk.as_mut() {
            if cursor.expects_more() {
                cursor.push(line);
                continue;
            }
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(&mut files, &mut current_file, &mut current_hunk);
            let (old_path, new_path) = parse_git_header(rest);
            current_file = Some(ChangeRecord {
                old_path,
                new_path,
                ..Default::default()
            });
            continue;
        }

        if line.starts_with("--- ")
            && lines.peek().is_some_and(|next| next.starts_with("+++ "))
        {
            // A plain unified diff has no `diff --git` line: a `---` that
            // arrives after a hunk opens the next file section.
            let opens_section = match current_file.as_ref() {
                None => true,
                Some(file) => current_hunk.is_some() || !file.hunks.is_empty(),
            };
            if opens_section {
                finish_file(&mut files, &mut current_file, &mut current_hunk);
                current_file = Some(ChangeRecord::default());
            }
            finish_hunk(&mut current_file, &mut current_hunk);
            if let Some(file) = current_file.as_mut() {
                file.old_path = header_path(&line[4..]);
                if let Some(next) = lines.next() {
                    file.new_path = header_path(&next[4..]);
                }
            }
            continue;
        }

        if line.starts_with("@@") {
            finish_hunk(&mut current_file, &mut current_hunk);
            let Some(file) = current_file.as_ref() else {
                continue;
            };
            let range = parse_hunk_header(line)?;
            current_hunk = Some(HunkCursor::new(file.hunks.len(), range));
            continue;
        }

        if let Some(cursor) = current_hunk.as_mut() {
            if cursor.accepts(line) {
                cursor.push(line);
                continue;
            }
            finish_hunk(&mut current_file, &mut current_hunk);
        }

        let Some(file) = current_file.as_mut() else {
            continue;
        };
        if line.starts_with("deleted file mode") {
            file.is_removed = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            file.old_path = non_empty(&unquote(path.trim()));
        } else if let Some(path) = line.strip_prefix("rename to ") {
            file.new_path = non_empty(&unquote(path.trim()));
        } else if line.starts_with("Binary files ") || line == "GIT binary patch" {
            file.is_binary = true;
        }
    }

    finish_file(&mut files, &mut current_file, &mut current_hunk);
    Ok(files)
}

/// Old/new start and optional counts parsed from a hunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkRange {
    old_start: usize,
    old_count: Option<usize>,
    new_start: usize,
    new_count: Option<usize>,
}

/// Accumulates one hunk while tracking line numbers on both sides.
struct HunkCursor {
    hunk: Hunk,
    old_no: usize,
    new_no: usize,
    old_left: Option<usize>,
    new_left: Option<usize>,
}

impl HunkCursor {
    fn new(index: usize, range: HunkRange) -> Self {
        Self {
            hunk: Hunk {
                index,
                changes: Vec::new(),
            },
            old_no: range.old_start.max(1),
            new_no: range.new_start.max(1),
            old_left: range.old_count,
            new_left: range.new_count,
        }
    }

    /// True while the header's counts say more lines belong to this hunk.
    fn expects_more(&self) -> bool {
        match (self.old_left, self.new_left) {
            (Some(old), Some(new)) => old > 0 || new > 0,
            _ => false,
        }
    }

    /// Whether a line can continue an open-ended hunk.
    fn accepts(&self, line: &str) -> bool {
        if self.old_left.is_some() && self.new_left.is_some() {
            // Counted hunk that is already complete; only the
            // "no newline" marker may still trail it.
            return line.starts_with('\\');
        }
        line.is_empty()
            || line.starts_with(' ')
            || line.starts_with('\\')
            || (line.starts_with('+') && !line.starts_with("+++ "))
            || (line.starts_with('-') && !line.starts_with("--- "))
    }

    fn push(&mut self, line: &str) {
        let (old_line, new_line, content) = match line.chars().next() {
            Some('+') => (None, Some(self.new_no), &line[1..]),
            Some('-') => (Some(self.old_no), None, &line[1..]),
            Some('\\') => return,
            Some(' ') => (Some(self.old_no), Some(self.new_no), &line[1..]),
            _ => (Some(self.old_no), Some(self.new_no), line),
        };
        if old_line.is_some() {
            self.old_no += 1;
            self.old_left = self.old_left.map(|n| n.saturating_sub(1));
        }
        if new_line.is_some() {
            self.new_no += 1;
            self.new_left = self.new_left.map(|n| n.saturating_sub(1));
        }
        self.hunk.changes.push(LineChange {
            old_line,
            new_line,
            hunk_index: self.hunk.index,
            content: content.to_string(),
        });
    }
}

/// Split the `a/{old} b/{new}` tail of a `diff --git` line. Either side
/// may be quoted when the path has unusual characters.
fn parse_git_header(rest: &str) -> (Option<String>, Option<String>) {
    let (old, new) = if rest.starts_with('"') {
        let Some((old, tail)) = take_quoted(rest) else {
            return (None, None);
        };
        (old, unquote(tail.trim_start()))
    } else if let Some(at) = rest.find(" \"") {
        (rest[..at].to_string(), unquote(&rest[at + 1..]))
    } else if let Some((old, new)) = rest.split_once(" b/") {
        (old.to_string(), format!("b/{}", new))
    } else {
        return (None, None);
    };
    let old = old.strip_prefix("a/").unwrap_or(&old);
    let new = new.strip_prefix("b/").unwrap_or(&new);
    (non_empty(old), non_empty(new))
}

/// Path from a `---`/`+++` line with the `a/`/`b/` prefix and any
/// trailing timestamp removed. `/dev/null` is kept as the sentinel.
fn header_path(raw: &str) -> Option<String> {
    let path = unquote(raw.split('\t').next().unwrap_or(raw).trim());
    if path == NULL_DEVICE {
        return Some(NULL_DEVICE.to_string());
    }
    let path = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(&path);
    non_empty(path)
}

/// Decode a path git wrote as a C-style quoted string (`core.quotePath`).
/// Anything else is returned as is.
fn unquote(raw: &str) -> String {
    match take_quoted(raw) {
        Some((path, rest)) if rest.is_empty() => path,
        _ => raw.to_string(),
    }
}

/// Decode the quoted string at the start of `s`, returning it and whatever
/// follows the closing quote. Octal escapes are raw bytes of a UTF-8 name.
fn take_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('"')?;
    let mut bytes = Vec::new();
    let mut buf = [0u8; 4];
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((String::from_utf8_lossy(&bytes).into_owned(), &body[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => bytes.push(b'\n'),
                    't' => bytes.push(b'\t'),
                    'r' => bytes.push(b'\r'),
                    'a' => bytes.push(0x07),
                    'b' => bytes.push(0x08),
                    'f' => bytes.push(0x0c),
                    'v' => bytes.push(0x0b),
                    '0'..='7' => {
                        let mut value = escaped.to_digit(8)?;
                        for _ in 0..2 {
                            let (_, digit) = chars.next()?;
                            value = value * 8 + digit.to_digit(8)?;
                        }
                        bytes.push(u8::try_from(value).ok()?);
                    }
                    other => bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes()),
                }
            }
            _ => bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
        }
    }
    None
}

fn non_empty(path: &str) -> Option<String> {
    let path = path.trim();
    (!path.is_empty()).then(|| path.to_string())
}

fn parse_hunk_header(line: &str) -> Result<HunkRange, DiffError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| DiffError::Parse("Invalid hunk header".to_string()))?;
    let header = match header.find("@@") {
        Some(end) => &header[..end],
        None => header,
    };
    let mut parts = header.split_whitespace();
    let Some(old_part) = parts.next() else {
        return Ok(HunkRange {
            old_start: 1,
            old_count: None,
            new_start: 1,
            new_count: None,
        });
    };
    let new_part = parts
        .next()
        .ok_or_else(|| DiffError::Parse(format!("Missing new range in {}", line)))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;

    Ok(HunkRange {
        old_start,
        old_count: Some(old_count),
        new_start,
        new_count: Some(new_count),
    })
}

fn parse_range(part: &str, prefix: char) -> Result<(usize, usize), DiffError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| DiffError::Parse(format!("Invalid range prefix in {}", part)))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str
        .parse::<usize>()
        .map_err(|_| DiffError::Parse(format!("Invalid range start in {}", part)))?;
    let count = count_str
        .parse::<usize>()
        .map_err(|_| DiffError::Parse(format!("Invalid range count in {}", part)))?;
    Ok((start, count))
}
