pub mod assembler;
pub mod blob;

pub use assembler::ContextAssembler;
pub use blob::EntryKind;

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::config::ContextConfig;
use crate::index::{safe_parent_context, StructureIndex};
use crate::pr::diff::parse_diff;
use crate::pr::DiffError;

/// Build the LLM-ready context for a PR diff against the checked-out tree
/// at `root`.
///
/// Only an unparseable diff is an error; everything else (missing files,
/// index failures, usage lookups) degrades to less context.
#[instrument(skip_all, fields(root = %root.display(), diff_bytes = diff_text.len()))]
pub fn assemble(
    root: &Path,
    diff_text: &str,
    index: &dyn StructureIndex,
    options: &ContextConfig,
) -> Result<String, DiffError> {
    let records = parse_diff(diff_text)?;
    let mut ctx = ContextAssembler::new(root, options);

    // Raw diff first so the model sees the exact edits.
    ctx.add_diff(diff_text);

    for record in &records {
        if record.is_removed {
            debug!(path = ?record.old_path, "skipped removed file");
            continue;
        }
        let Some(path) = record.path() else {
            warn!(old_path = ?record.old_path, "no post-change path for a non-removed file; skipping");
            continue;
        };

        if record.is_binary {
            debug!(path, "skipped binary file");
            continue;
        }
        ctx.add_file(path);

        for hunk in &record.hunks {
            let Some(line) = hunk.first_new_line() else {
                continue;
            };
            let Some(symbol) = safe_parent_context(index, path, line) else {
                continue;
            };
            if ctx.add_symbol(path, &symbol, line) {
                debug!(path, hunk = hunk.index, "attached symbol for hunk");
            }
        }
    }

    if options.include_usages {
        let names: Vec<String> = ctx.touched_symbols().map(str::to_string).collect();
        for name in names {
            let sites = index.usages(&name).unwrap_or_else(|e| {
                debug!(symbol = %name, error = %e, "usage lookup failed; treating as no usages");
                Vec::new()
            });
            for site in &sites {
                ctx.add_usage(&name, site);
            }
        }
    }

    let rendered = ctx.render();
    let count = |kind: EntryKind| ctx.blob().entries().iter().filter(|e| e.kind == kind).count();
    info!(
        files = count(EntryKind::File),
        symbols = count(EntryKind::Symbol),
        usages = count(EntryKind::Usage),
        chars = rendered.len(),
        "context assembled"
    );
    Ok(rendered)
}
