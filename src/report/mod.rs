use crate::review::ReviewOutcome;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

pub const REVIEW_BANNER: &str = "--- AI PR Review ---";
pub const END_BANNER: &str = "--- End of AI PR Review ---";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Print the review to the terminal, and also write it as markdown when
/// `output_path` is given.
#[instrument(skip(outcome), fields(pr = %outcome.pr))]
pub fn output(outcome: &ReviewOutcome, output_path: Option<&Path>) -> Result<(), ReportError> {
    debug!("writing review to terminal");
    print_terminal_report(outcome);
    if let Some(path) = output_path {
        debug!(path = %path.display(), "writing review to file");
        write_markdown_report(outcome, path)?;
    }
    Ok(())
}

fn terminal_header(outcome: &ReviewOutcome) -> String {
    format!(
        "PR {}: \"{}\" (model: {})",
        outcome.pr, outcome.title, outcome.model
    )
}

/// Print the review between banners. The review text itself is left
/// uncolored so it can be piped.
fn print_terminal_report(outcome: &ReviewOutcome) {
    println!();
    println!("{}", terminal_header(outcome).bold());
    println!("{}", REVIEW_BANNER.cyan().bold());
    println!("{}", outcome.review.trim_end());
    println!("{}", END_BANNER.cyan().bold());
}

fn render_markdown(outcome: &ReviewOutcome) -> String {
    let mut md = String::new();
    md.push_str(&format!(
        "# Review of PR {}: \"{}\"\n\n",
        outcome.pr, outcome.title
    ));
    md.push_str(&format!(
        "**Model:** {} | **Context:** {} chars\n\n",
        outcome.model, outcome.context_chars
    ));
    md.push_str(outcome.review.trim_end());
    md.push('\n');
    md
}

fn write_markdown_report(outcome: &ReviewOutcome, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, render_markdown(outcome))?;
    Ok(())
}
