//! Expression parsing error types

use thiserror::Error;

/// Errors that can occur while parsing a RillTime expression
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input is not a valid expression, or has more than one reading
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// The `tz` suffix names an unknown IANA timezone
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
