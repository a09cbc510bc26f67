mod config;
mod context;
mod index;
mod llm;
mod pr;
mod repo;
mod report;
mod review;

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// AI PR Review: fetches a GitHub Pull Request, gathers the changed files
/// and the code around each change, and asks an LLM for a review.
#[derive(Parser, Debug)]
#[command(name = "ai-pr-review", version, about)]
struct Cli {
    /// Owner of the GitHub repository (e.g., 'octocat')
    repo_owner: String,

    /// Name of the GitHub repository (e.g., 'Spoon-Knife')
    repo_name: String,

    /// Pull Request number
    pr_number: u64,

    /// Keep the temporary repository after execution (for debugging)
    #[arg(long)]
    keep_temp: bool,

    /// Chat model to use instead of the configured one
    #[arg(long)]
    model: Option<String>,

    /// Also write the review as markdown to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log at debug level when RUST_LOG is not set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;
    let code = exit_code(&result, &mut std::io::stderr());
    if code != 0 {
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let config = config::Config::load()?;
    review(cli, config).await
}

async fn review(cli: Cli, mut config: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let pr_ref = pr::PrRef::new(&cli.repo_owner, &cli.repo_name, cli.pr_number);
    let _main_span = info_span!("pr_review", pr = %pr_ref).entered();

    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    debug!(model = %config.llm.model, base_url = %config.llm.base_url, "resolved LLM settings");

    let reviewer = review::Reviewer::from_config(&config)?.keep_temp(cli.keep_temp);
    let outcome = reviewer.review_pr(&pr_ref).await?;

    report::output(&outcome, cli.output.as_deref())?;
    info!("done");
    Ok(())
}

/// Process exit code for a finished run; failures are reported on `stderr`.
fn exit_code(result: &Result<(), Box<dyn std::error::Error>>, stderr: &mut impl Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(stderr, "{e}");
            1
        }
    }
}
