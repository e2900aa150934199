//! Expression Resolution
//!
//! Resolves parsed expressions against a live reference context:
//!
//! - **Context**: the instants supplied by the caller and the resolved
//!   window handed back
//! - **Resolver**: anchor folding, point resolution, display-grain
//!   rounding
//! - **Comparison**: deriving a second window to compare against
//!
//! # Examples
//!
//! ```rust
//! use rilltime::expr::parse;
//! use rilltime::resolve::{resolve, ReferenceContext};
//!
//! let ctx = ReferenceContext::new("2025-05-14T13:43:00Z".parse().unwrap());
//! let window = resolve(&parse("-7d, now/d").unwrap(), &ctx).unwrap();
//! assert!(window.start.unwrap() < window.end.unwrap());
//! ```

mod comparison;
mod context;
mod error;
mod resolver;

pub use comparison::comparison_interval;
pub use context::{ReferenceContext, ResolvedInterval};
pub use error::{ResolveError, ResolveResult};
pub use resolver::resolve;
