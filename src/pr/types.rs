/// Metadata and raw diff of a pull request fetched from the hosting service.
/// Not Deserialize: built from the GitHub JSON response plus the
/// separately fetched diff text.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// PR body; empty when the author left none
    pub description: String,
    /// Commit the PR head points at
    pub head_sha: String,
    /// Raw unified diff text
    pub diff: String,
}

/// Identifies a pull request on the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl std::fmt::Display for PrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// A single file section within a unified diff.
#[derive(Debug, Clone, Default)]
pub struct ChangeRecord {
    /// Path before the change, `None` for created files
    pub old_path: Option<String>,
    /// Path after the change, `None` (or `/dev/null`) for deleted files
    pub new_path: Option<String>,
    /// Whether the file no longer exists after the change
    pub is_removed: bool,
    /// Whether git reported the file as binary
    pub is_binary: bool,
    /// Hunks in diff order
    pub hunks: Vec<Hunk>,
}

impl ChangeRecord {
    /// Path of the file in the post-change tree, if it still exists there.
    pub fn path(&self) -> Option<&str> {
        if self.is_removed {
            return None;
        }
        self.new_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone, Default)]
pub struct Hunk {
    /// Position of this hunk within its file section (zero-based)
    pub index: usize,
    /// Every line of the hunk, in order
    pub changes: Vec<LineChange>,
}

impl Hunk {
    /// Smallest one-based line number that exists in the post-change file.
    ///
    /// `None` for pure deletions: nothing in the hunk survives into the new
    /// file, so there is no place to resolve an enclosing symbol.
    pub fn first_new_line(&self) -> Option<usize> {
        self.changes.iter().filter_map(|c| c.new_line).min()
    }
}

/// One line of a hunk.
///
/// Additions have `old_line = None`, deletions have `new_line = None`,
/// context lines carry both.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)] // Only new_line drives context lookup; the rest is kept for callers inspecting hunks
pub struct LineChange {
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
    pub hunk_index: usize,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(old_line: Option<usize>, new_line: Option<usize>) -> LineChange {
        LineChange {
            old_line,
            new_line,
            hunk_index: 0,
            content: String::new(),
        }
    }

    #[test]
    fn test_first_new_line_takes_minimum() {
        let hunk = Hunk {
            index: 0,
            changes: vec![
                change(Some(9), None),
                change(None, Some(12)),
                change(Some(10), Some(11)),
            ],
        };
        assert_eq!(hunk.first_new_line(), Some(11));
    }

    #[test]
    fn test_first_new_line_pure_deletion() {
        let hunk = Hunk {
            index: 0,
            changes: vec![change(Some(3), None), change(Some(4), None)],
        };
        assert_eq!(hunk.first_new_line(), None);
    }

    #[test]
    fn test_removed_record_has_no_path() {
        let record = ChangeRecord {
            old_path: Some("gone.py".to_string()),
            new_path: None,
            is_removed: true,
            ..Default::default()
        };
        assert!(record.path().is_none());
    }

    #[test]
    fn test_pr_ref_display() {
        let pr = PrRef::new("octocat", "Spoon-Knife", 7);
        assert_eq!(pr.to_string(), "octocat/Spoon-Knife#7");
    }
}
