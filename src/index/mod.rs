//! Source structure lookups: which symbol encloses a line, and where a
//! symbol is referenced.

pub mod lang;
pub mod scan;

pub use scan::ScanIndex;

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} does not exist inside the checkout")]
    NotInTree { path: String },

    #[error("Line {line} is out of range for {path} ({len} lines)")]
    LineOutOfRange { path: String, line: usize, len: usize },

    #[error("Failed to search for usages of {symbol}: {reason}")]
    Search { symbol: String, reason: String },
}

/// The named construct (function, method, class, ...) enclosing a line.
///
/// Partial results are tolerated: an index may know the code of a symbol
/// without knowing its name or extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolContext {
    pub name: Option<String>,
    pub code: String,
    /// One-based, inclusive
    pub start_line: Option<usize>,
    /// One-based, inclusive
    pub end_line: Option<usize>,
}

/// A place in the tree where a symbol is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSite {
    pub file: Option<String>,
    pub line_number: Option<usize>,
    pub snippet: Option<String>,
}

/// Capability interface over a structure index of one checked-out tree.
pub trait StructureIndex {
    /// Smallest named symbol enclosing `zero_based_line` of `path`
    /// (relative to the tree root), or `None` when the line is top level.
    fn symbol_at(
        &self,
        path: &str,
        zero_based_line: usize,
    ) -> Result<Option<SymbolContext>, IndexError>;

    /// Reference sites of `symbol` across the tree.
    fn usages(&self, symbol: &str) -> Result<Vec<UsageSite>, IndexError>;
}

/// Enclosing symbol of a one-based line, with every index failure turned
/// into "no context". Line numbers below 1 never reach the index.
pub fn safe_parent_context(
    index: &dyn StructureIndex,
    path: &str,
    one_based_line: usize,
) -> Option<SymbolContext> {
    let zero_based_line = one_based_line.checked_sub(1)?;
    match index.symbol_at(path, zero_based_line) {
        Ok(symbol) => symbol,
        Err(e) => {
            debug!(path, line = one_based_line, error = %e, "no parent symbol context");
            None
        }
    }
}
