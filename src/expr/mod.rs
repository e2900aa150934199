//! RillTime Expression Language
//!
//! Grammar, semantic model and legacy alias sugar for RillTime
//! expressions:
//!
//! - **AST**: the closed [`Interval`] sum type and its point-in-time model
//! - **Parser**: nom grammar with a single derivation per accepted string
//! - **Aliases**: legacy range names and ISO-8601 durations
//!
//! # Examples
//!
//! ```rust
//! use rilltime::expr::parse;
//!
//! let expr = parse("-7d, now/d : h").unwrap();
//! assert_eq!(expr.to_string(), "-7d, now/d : h");
//! ```

pub mod alias;
mod ast;
mod error;
mod parser;

pub use ast::{
    AbsDate, AnchorLabel, GrainDuration, Interval, OrdinalPart, PointBase, PointInTime,
    Reduced, RillTime, Supported,
};
pub use error::{ParseError, ParseResult};
pub use parser::parse;
