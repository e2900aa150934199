//! Comparison range derivation
//!
//! A dashboard compares its primary window against a second one: the same
//! window shifted back by a fixed period (`rill-PD`, `rill-PW`, ...), by
//! its own length (`rill-PP`, "previous period"), or an arbitrary
//! expression resolved independently.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::expr::parse;
use crate::grain::Grain;
use crate::resolve::context::{ReferenceContext, ResolvedInterval};
use crate::resolve::error::ResolveResult;
use crate::resolve::resolver::resolve;

/// Fixed comparison aliases that shift the primary window by one period
const PERIOD_ALIASES: &[(&str, Grain)] = &[
    ("rill-PD", Grain::Day),
    ("rill-PW", Grain::Week),
    ("rill-PM", Grain::Month),
    ("rill-PQ", Grain::Quarter),
    ("rill-PY", Grain::Year),
];

/// Previous period: shift the primary window back by its own length
const PREVIOUS_PERIOD: &str = "rill-PP";

/// Derive the comparison window for a primary resolved interval
///
/// Returns `Ok(None)` when the primary spans all time: comparison is
/// undefined for an unbounded window, by design. Anything that is not a
/// fixed alias is resolved as an independent expression.
pub fn comparison_interval(
    primary: &ResolvedInterval,
    comparison: &str,
    ctx: &ReferenceContext,
) -> ResolveResult<Option<ResolvedInterval>> {
    let (start, end) = match (&primary.start, &primary.end) {
        (Some(start), Some(end)) => (start.clone(), end.clone()),
        _ => return Ok(None),
    };

    let token = comparison.trim();
    if token.eq_ignore_ascii_case(PREVIOUS_PERIOD) {
        let length = end.clone() - start.clone();
        return Ok(Some(shifted(
            &primary.grain,
            shift_by(&start, length),
            shift_by(&end, length),
        )));
    }
    for (alias, grain) in PERIOD_ALIASES {
        if alias.eq_ignore_ascii_case(token) {
            return Ok(Some(shifted(
                &primary.grain,
                grain.add_to(&start, -1),
                grain.add_to(&end, -1),
            )));
        }
    }

    let expr = parse(token)?;
    resolve(&expr, ctx).map(Some)
}

fn shift_by(instant: &DateTime<Tz>, length: chrono::Duration) -> DateTime<Tz> {
    instant
        .clone()
        .checked_sub_signed(length)
        .unwrap_or_else(|| instant.clone())
}

fn shifted(grain: &Option<Grain>, start: DateTime<Tz>, end: DateTime<Tz>) -> ResolvedInterval {
    ResolvedInterval {
        start: Some(start),
        end: Some(end),
        grain: *grain,
        // a window shifted fully into the past is no longer accumulating
        is_complete: false,
    }
}
