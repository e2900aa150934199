//! Resolution error types

use thiserror::Error;

use crate::expr::ParseError;

/// Errors that can occur while resolving an expression against a
/// reference context
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The expression names an anchor the context does not supply
    #[error("Anchor unavailable: {0}")]
    AnchorUnavailable(&'static str),

    /// The resolved end does not come after the resolved start; the
    /// caller decides the fallback
    #[error("Invalid interval: end {end} is not after start {start}")]
    InvalidInterval { start: String, end: String },

    /// A comparison expression failed to parse
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;
