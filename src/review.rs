//! End-to-end review of one pull request: fetch, check out, assemble
//! context, ask the model.

use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument};

use crate::config::{Config, ConfigError, ContextConfig, LlmConfig};
use crate::context;
use crate::index::{ScanIndex, StructureIndex};
use crate::llm::prompt::create_review_prompts;
use crate::llm::{ChatClient, ChatRequest, LanguageModel, LlmError};
use crate::pr::{DiffError, GitHubClient, HostingError, HostingService, PrRef};
use crate::repo::{Checkout, GitCli, RepoError, VersionControl};

/// Failures that abort a review. Everything else degrades to less context.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error("Context assembly task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Builds the structure index over a freshly checked-out tree.
pub type IndexFactory = Box<dyn Fn(&Path) -> Box<dyn StructureIndex + Send> + Send + Sync>;

/// Index factory for the heuristic source scanner.
pub fn scan_index() -> IndexFactory {
    Box::new(|root: &Path| -> Box<dyn StructureIndex + Send> { Box::new(ScanIndex::new(root)) })
}

/// A finished review and the PR it is about.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub pr: PrRef,
    pub title: String,
    pub model: String,
    pub review: String,
    /// Length of the context handed to the model
    pub context_chars: usize,
}

pub struct Reviewer {
    hosting: Box<dyn HostingService>,
    vcs: Box<dyn VersionControl>,
    model: Box<dyn LanguageModel>,
    index: IndexFactory,
    llm: LlmConfig,
    context: ContextConfig,
    keep_temp: bool,
}

impl Reviewer {
    pub fn new(
        hosting: Box<dyn HostingService>,
        vcs: Box<dyn VersionControl>,
        model: Box<dyn LanguageModel>,
        index: IndexFactory,
        config: &Config,
    ) -> Self {
        Self {
            hosting,
            vcs,
            model,
            index,
            llm: config.llm.clone(),
            context: config.context.clone(),
            keep_temp: false,
        }
    }

    /// Reviewer backed by GitHub, the `git` CLI and an OpenAI-compatible
    /// endpoint. Fails before any I/O when no LLM API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ReviewError> {
        let api_key = config.llm_api_key()?;
        Ok(Self::new(
            Box::new(GitHubClient::new(&config.github)),
            Box::new(GitCli::new(config.github.clone_base.clone())),
            Box::new(ChatClient::new(&config.llm, api_key)),
            scan_index(),
            config,
        ))
    }

    /// Leave the checked-out tree on disk after the run.
    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    #[instrument(skip_all, fields(pr = %pr, model = %self.llm.model))]
    pub async fn review_pr(&self, pr: &PrRef) -> Result<ReviewOutcome, ReviewError> {
        let pull = self.hosting.fetch_pr_data(pr).await?;
        info!(number = pull.number, title = %pull.title, head_sha = %pull.head_sha, "fetched PR data");

        // Removed on every return path below unless keep_temp is set.
        let checkout = Checkout::create(pr, self.keep_temp)?;
        self.vcs.clone_repo(pr, checkout.path()).await?;
        self.vcs.checkout(checkout.path(), &pull.head_sha).await?;

        // Assembly reads the whole tree; keep it off the async workers.
        let index = (self.index)(checkout.path());
        let root = checkout.path().to_path_buf();
        let diff = pull.diff.clone();
        let options = self.context.clone();
        let context_blob = tokio::task::spawn_blocking(move || {
            context::assemble(&root, &diff, index.as_ref(), &options)
        })
        .await??;

        let (system_prompt, user_prompt) =
            create_review_prompts(&pull.title, &pull.description, &context_blob);
        let request = ChatRequest {
            model: self.llm.model.clone(),
            system_prompt,
            user_prompt,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
        };
        let review = self.model.complete(&request).await?;
        info!(review_chars = review.len(), "review complete");

        Ok(ReviewOutcome {
            pr: pr.clone(),
            title: pull.title,
            model: request.model,
            review,
            context_chars: context_blob.len(),
        })
    }
}
