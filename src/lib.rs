//! # rilltime
//!
//! Compact relative time-range expressions ("RillTime") resolved into
//! concrete, timezone-aware intervals.
//!
//! A user writes `-7d, now/d : h` in a URL or dashboard config; this
//! crate parses it once and resolves it against a live reference context
//! (current time, watermark, dataset bounds) whenever that context
//! changes. Parsing and resolution are pure, synchronous functions over
//! immutable inputs: no shared state, no locking, safe to invoke
//! concurrently, and the same `(expression, context)` always yields the
//! same window.
//!
//! ## Modules
//!
//! - [`expr`]: grammar, semantic model and legacy alias sugar
//! - [`resolve`]: anchor resolution and comparison range derivation
//! - [`grain`]: time grains, truncation and calendar arithmetic
//! - [`label`]: best-effort human labels for common shapes
//!
//! ## Quick Start
//!
//! ```rust
//! use rilltime::{parse, resolve, ReferenceContext};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let expr = parse("-7d, now/d : h")?;
//!     let ctx = ReferenceContext::new("2025-05-14T13:43:00Z".parse()?);
//!
//!     let window = resolve(&expr, &ctx)?;
//!     assert_eq!(window.start.unwrap().to_rfc3339(), "2025-05-07T00:00:00+00:00");
//!     assert_eq!(window.end.unwrap().to_rfc3339(), "2025-05-14T00:00:00+00:00");
//!     Ok(())
//! }
//! ```
//!
//! Errors propagate to the caller, which is expected to fall back to a
//! default range; this crate performs no logging above trace level and
//! owns no UI.

pub mod expr;
pub mod grain;
pub mod label;
pub mod resolve;

pub use expr::{parse, GrainDuration, Interval, ParseError, PointInTime, RillTime, Supported};
pub use grain::{select_grain, Grain};
pub use label::label_for;
pub use resolve::{
    comparison_interval, resolve, ReferenceContext, ResolveError, ResolvedInterval,
};
