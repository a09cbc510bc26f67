//! Local checkout of the repository under review.
//!
//! Shells out to `git` via `tokio::process::Command`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::pr::PrRef;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Git command failed: {command} ({status})\nStdout: {stdout}\nStderr: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stdout: String,
        stderr: String,
    },
}

/// Gets a readable file tree of the PR head onto local disk.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone the PR's repository into the existing, empty directory `dest`.
    async fn clone_repo(&self, pr: &PrRef, dest: &Path) -> Result<(), RepoError>;

    /// Check out `sha` in the clone at `tree`.
    async fn checkout(&self, tree: &Path, sha: &str) -> Result<(), RepoError>;
}

/// `git` command-line implementation.
pub struct GitCli {
    clone_base: String,
}

impl GitCli {
    pub fn new(clone_base: impl Into<String>) -> Self {
        Self {
            clone_base: clone_base.into(),
        }
    }

    fn clone_url(&self, pr: &PrRef) -> String {
        format!(
            "{}/{}/{}.git",
            self.clone_base.trim_end_matches('/'),
            pr.owner,
            pr.repo
        )
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip_all, fields(pr = %pr))]
    async fn clone_repo(&self, pr: &PrRef, dest: &Path) -> Result<(), RepoError> {
        let url = self.clone_url(pr);
        let dest = dest.to_string_lossy();
        info!(%url, "cloning repository");
        run_git(None, &["clone", "--quiet", &url, &dest]).await?;
        Ok(())
    }

    #[instrument(skip(self, tree))]
    async fn checkout(&self, tree: &Path, sha: &str) -> Result<(), RepoError> {
        // PR heads from forks are not part of a plain clone. When the fetch
        // is refused the commit may still be local; checkout decides.
        if let Err(e) = run_git(Some(tree), &["fetch", "--quiet", "origin", sha]).await {
            debug!(error = %e, "fetch of PR head failed; trying local checkout");
        }
        run_git(Some(tree), &["checkout", "--quiet", sha]).await?;
        info!("checked out PR head");
        Ok(())
    }
}

async fn run_git(cwd: Option<&Path>, args: &[&str]) -> Result<String, RepoError> {
    let command = format!("git {}", args.join(" "));
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|source| RepoError::Spawn {
        command: command.clone(),
        source,
    })?;
    if !output.status.success() {
        return Err(RepoError::CommandFailed {
            command,
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `relative` inside the checked-out tree at `root`, fully resolved.
///
/// `None` when the file does not exist or when it resolves outside the
/// tree, whether through `..`, an absolute path or a symlink.
pub fn resolve_in_tree(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let root = root.canonicalize().ok()?;
    let full = root.join(relative).canonicalize().ok()?;
    full.starts_with(&root).then_some(full)
}

/// Temporary directory holding the checked-out tree for one run.
///
/// Removed when dropped, unless created with `keep`, in which case the
/// directory is left behind and its location logged.
#[derive(Debug)]
pub struct Checkout {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Checkout {
    pub fn create(pr: &PrRef, keep: bool) -> Result<Self, RepoError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("ai_pr_review_{}_{}_", pr.owner, pr.repo))
            .tempdir()
            .map_err(RepoError::TempDir)?;
        let path = dir.path().to_path_buf();
        debug!(path = %path.display(), "created temporary directory");
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let path = dir.keep();
            info!(path = %path.display(), "keeping temporary directory");
        } else if let Err(e) = dir.close() {
            warn!(path = %self.path.display(), error = %e, "failed to remove temporary directory");
        } else {
            debug!(path = %self.path.display(), "removed temporary directory");
        }
    }
}
