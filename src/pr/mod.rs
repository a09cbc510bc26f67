pub mod diff;
pub mod types;

pub use types::{ChangeRecord, Hunk, LineChange, PrRef, PullRequest};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::GitHubConfig;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Failed to parse diff: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Error fetching PR data for {pr}: {source}")]
    Request {
        pr: PrRef,
        #[source]
        source: reqwest::Error,
    },

    #[error("Error fetching PR data for {pr}: {reason}")]
    Response { pr: PrRef, reason: String },
}

/// Source of pull request metadata and diffs.
#[async_trait]
pub trait HostingService: Send + Sync {
    /// Fetch the raw diff plus title, description and head commit of a PR.
    async fn fetch_pr_data(&self, pr: &PrRef) -> Result<PullRequest, HostingError>;
}

/// GitHub REST API client.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn pull_url(&self, pr: &PrRef) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, pr.owner, pr.repo, pr.number
        )
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("User-Agent", "ai-pr-review")
            .header("Accept", accept);
        // Public repositories work without a token.
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        }
    }
}

#[derive(serde::Deserialize)]
struct Head {
    sha: String,
}

#[derive(serde::Deserialize)]
struct PullResponse {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    head: Head,
}

impl PullResponse {
    fn into_pull_request(self, diff: String) -> PullRequest {
        PullRequest {
            number: self.number,
            title: self.title.unwrap_or_default(),
            description: self.body.unwrap_or_default(),
            head_sha: self.head.sha,
            diff,
        }
    }
}

#[async_trait]
impl HostingService for GitHubClient {
    #[instrument(skip_all, fields(pr = %pr))]
    async fn fetch_pr_data(&self, pr: &PrRef) -> Result<PullRequest, HostingError> {
        let url = self.pull_url(pr);
        let wrap = |source: reqwest::Error| HostingError::Request {
            pr: pr.clone(),
            source,
        };

        debug!("fetching PR diff from GitHub API");
        let diff_text = self
            .get(&url, "application/vnd.github.v3.diff")
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?
            .text()
            .await
            .map_err(wrap)?;
        debug!(diff_bytes = diff_text.len(), "received PR diff");

        debug!("fetching PR metadata from GitHub API");
        let body = self
            .get(&url, "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?
            .text()
            .await
            .map_err(wrap)?;
        let metadata: PullResponse =
            serde_json::from_str(&body).map_err(|e| HostingError::Response {
                pr: pr.clone(),
                reason: format!("unexpected metadata payload: {}", e),
            })?;
        debug!(head_sha = %metadata.head.sha, "received PR metadata");

        Ok(metadata.into_pull_request(diff_text))
    }
}
