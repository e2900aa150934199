//! Anchor resolution
//!
//! Turns a parsed expression plus a [`ReferenceContext`] into a concrete
//! [`ResolvedInterval`]. Resolution is pure and idempotent: it owns no
//! state, mutates nothing, and the same `(expression, context)` pair
//! always produces the same window, so callers can cache results keyed by
//! `(expression string, context version)`.
//!
//! Every offset-based interval shape is expanded to a start/end pair
//! first and resolved through one code path; ordinal and ISO shapes
//! compute their boundaries directly.

use chrono::{DateTime, NaiveDate, Weekday};
use chrono_tz::Tz;

use crate::expr::{
    AbsDate, AnchorLabel, GrainDuration, Interval, OrdinalPart, PointBase, PointInTime,
    RillTime,
};
use crate::grain::{from_local, Grain};
use crate::resolve::context::{ReferenceContext, ResolvedInterval};
use crate::resolve::error::{ResolveError, ResolveResult};

/// Resolve an expression against a reference context
///
/// The algorithm:
/// 1. fold all `as of` overrides into one cumulative anchor and compute
///    the reference instant (default: `now`)
/// 2. expand the interval to a start/end pair where it has one and
///    resolve each point as `anchor + offset`, then snaps left to right
/// 3. round both boundaries to the display grain, when one was requested
///
/// A resolved `end <= start` is surfaced as
/// [`ResolveError::InvalidInterval`] rather than auto-corrected.
pub fn resolve(expr: &RillTime, ctx: &ReferenceContext) -> ResolveResult<ResolvedInterval> {
    let tz = expr.timezone.unwrap_or(ctx.timezone);
    let now = ctx.now.with_timezone(&tz);
    tracing::trace!(expression = %expr, timezone = %tz, "resolving rill-time expression");

    let reference = fold_overrides(&expr.overrides, &now, ctx, &tz)?;

    let (mut start, mut end) = match &expr.interval {
        Interval::AllTime => {
            return Ok(ResolvedInterval {
                start: None,
                end: None,
                grain: expr.effective_grain(),
                is_complete: expr.is_complete(None).value,
            });
        }
        Interval::Iso { start, end } => resolve_iso(start, end.as_ref(), &tz),
        Interval::Ordinal(parts) => resolve_ordinal(parts, &reference, ctx.week_start),
        Interval::Shorthand(_) | Interval::PeriodToGrain(_) | Interval::StartEnd { .. } => {
            let (start_point, end_point) = expr
                .interval
                .to_start_end()
                .unwrap_or_else(|| (PointInTime::reference(), PointInTime::reference()));
            (
                resolve_point(&start_point, &reference, ctx, &tz)?,
                resolve_point(&end_point, &reference, ctx, &tz)?,
            )
        }
    };

    if let Some(grain) = expr.grain {
        start = grain.truncate(&start, ctx.week_start);
        end = grain.truncate(&end, ctx.week_start);
    }

    if end <= start {
        return Err(ResolveError::InvalidInterval {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }

    Ok(ResolvedInterval {
        start: Some(start),
        end: Some(end),
        grain: expr.effective_grain(),
        is_complete: expr.is_complete(None).value,
    })
}

/// Fold anchor overrides left to right into one synthetic point: offsets
/// sum, snaps concatenate, the last labelled or absolute base wins
fn fold_overrides(
    overrides: &[PointInTime],
    now: &DateTime<Tz>,
    ctx: &ReferenceContext,
    tz: &Tz,
) -> ResolveResult<DateTime<Tz>> {
    if overrides.is_empty() {
        return Ok(now.clone());
    }
    let mut base = PointBase::Labelled(AnchorLabel::Now);
    let mut offset = GrainDuration::default();
    let mut snaps = Vec::new();
    for point in overrides {
        match &point.base {
            PointBase::GrainRelative | PointBase::Labelled(AnchorLabel::Ref) => {}
            other => base = other.clone(),
        }
        offset = offset.plus(&point.offset);
        snaps.extend(point.snaps.iter().copied());
    }
    let folded = PointInTime { base, offset, snaps };
    resolve_point(&folded, now, ctx, tz)
}

/// Resolve one point: base anchor, then offset, then snaps
///
/// A point with an offset and no explicit snaps is aligned to the finest
/// unit of its offset.
fn resolve_point(
    point: &PointInTime,
    reference: &DateTime<Tz>,
    ctx: &ReferenceContext,
    tz: &Tz,
) -> ResolveResult<DateTime<Tz>> {
    let base = match &point.base {
        PointBase::GrainRelative | PointBase::Labelled(AnchorLabel::Ref) => reference.clone(),
        PointBase::Labelled(AnchorLabel::Now) => ctx.now.with_timezone(tz),
        PointBase::Labelled(AnchorLabel::Earliest) => {
            anchor(ctx.earliest, "earliest")?.with_timezone(tz)
        }
        PointBase::Labelled(AnchorLabel::Latest) => {
            anchor(ctx.latest, "latest")?.with_timezone(tz)
        }
        PointBase::Labelled(AnchorLabel::Watermark) => {
            anchor(ctx.watermark, "watermark")?.with_timezone(tz)
        }
        PointBase::Absolute(date) => date.resolve(tz),
    };

    let mut instant = point.offset.apply(&base);
    if point.snaps.is_empty() {
        if let Some(grain) = point.offset.finest() {
            instant = grain.truncate(&instant, ctx.week_start);
        }
    } else {
        for grain in &point.snaps {
            instant = grain.truncate(&instant, ctx.week_start);
        }
    }
    Ok(instant)
}

fn anchor(
    value: Option<DateTime<chrono::Utc>>,
    name: &'static str,
) -> ResolveResult<DateTime<chrono::Utc>> {
    value.ok_or(ResolveError::AnchorUnavailable(name))
}

/// An ISO literal covers the period of its precision; `a to b` runs from
/// the start of `a` through the end of `b`'s period
fn resolve_iso(
    start: &AbsDate,
    end: Option<&AbsDate>,
    tz: &Tz,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let start_instant = start.resolve(tz);
    let end_instant = match end {
        Some(end) => {
            let end_start = end.resolve(tz);
            end.precision().add_to(&end_start, 1)
        }
        None => start.precision().add_to(&start_instant, 1),
    };
    (start_instant, end_instant)
}

/// Ordinal parts narrow from the reference: `Y2024` jumps to that year,
/// every other part selects its 1-based unit from the parent period's
/// start boundary
fn resolve_ordinal(
    parts: &[OrdinalPart],
    reference: &DateTime<Tz>,
    week_start: Weekday,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let mut cursor = reference.clone();
    let mut finest = Grain::Year;
    for (i, part) in parts.iter().enumerate() {
        if part.grain == Grain::Year {
            let naive = NaiveDate::from_ymd_opt(part.index as i32, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_else(|| cursor.naive_local());
            cursor = from_local(&cursor.timezone(), naive);
        } else {
            if i == 0 {
                cursor = parent_grain(part.grain).truncate(&cursor, week_start);
            }
            cursor = part.grain.add_to(&cursor, i64::from(part.index) - 1);
        }
        finest = part.grain;
    }
    let end = finest.add_to(&cursor, 1);
    (cursor, end)
}

/// The period a bare ordinal part selects within
fn parent_grain(grain: Grain) -> Grain {
    match grain {
        Grain::Quarter | Grain::Month => Grain::Year,
        Grain::Week | Grain::Day => Grain::Month,
        _ => Grain::Year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse;
    use chrono::{Duration, Utc};

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    /// The fixed context shared by the acceptance scenarios
    fn ctx() -> ReferenceContext {
        ReferenceContext::new(utc("2025-05-14T13:43:00Z"))
            .watermark(utc("2025-05-14T00:00:00Z"))
    }

    fn resolve_str(expr: &str, ctx: &ReferenceContext) -> ResolvedInterval {
        resolve(&parse(expr).unwrap(), ctx).unwrap()
    }

    #[test]
    fn test_last_seven_days_hourly() {
        let resolved = resolve_str("-7d, now/d : h", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2025-05-07T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-14T00:00:00Z"));
        assert_eq!(resolved.grain, Some(Grain::Hour));
    }

    #[test]
    fn test_day_to_date() {
        let resolved = resolve_str("DTD", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2025-05-14T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-14T13:43:00Z"));
        // still accumulating
        assert!(resolved.is_complete);
    }

    #[test]
    fn test_quarter_with_anchor_override() {
        let resolved = resolve_str("1Q as of 2025-02-25T09:00:00Z-8W/Q", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2024-10-01T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_shorthand_equals_explicit_pair() {
        let ctx = ctx();
        assert_eq!(resolve_str("-7d", &ctx), resolve_str("-7d,ref", &ctx));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let ctx = ctx();
        let expr = parse("-3w, now/w : d").unwrap();
        let first = resolve(&expr, &ctx).unwrap();
        let second = resolve(&expr, &ctx).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_resolves_identically() {
        let ctx = ctx();
        for expression in [
            "-7d, now/d : h",
            "DTD",
            "-90d",
            "3w18d23h",
            "1Q as of 2025-02-25T09:00:00Z-8W/Q",
            "2025-02 to 2025-04",
            "Y2024 M5",
            "watermark-6h, watermark",
        ] {
            let parsed = parse(expression).unwrap();
            let reparsed = parse(&parsed.to_string()).unwrap();
            assert_eq!(
                resolve(&parsed, &ctx).unwrap(),
                resolve(&reparsed, &ctx).unwrap(),
                "round trip diverged for {}",
                expression
            );
        }
    }

    #[test]
    fn test_watermark_anchor() {
        let resolved = resolve_str("watermark-6h, watermark", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2025-05-13T18:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-14T00:00:00Z"));
    }

    #[test]
    fn test_missing_anchor_fails() {
        let err = resolve(&parse("earliest, latest").unwrap(), &ctx()).unwrap_err();
        assert!(matches!(err, ResolveError::AnchorUnavailable("earliest")));
    }

    #[test]
    fn test_inverted_interval_is_not_corrected() {
        // end resolves a week before start
        let err = resolve(&parse("now, now-1w").unwrap(), &ctx()).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInterval { .. }));
    }

    #[test]
    fn test_all_time_is_unbounded() {
        let resolved = resolve_str("inf", &ctx());
        assert!(resolved.is_all_time());
        assert_eq!(resolved.grain, None);
    }

    #[test]
    fn test_iso_literal_covers_its_period() {
        let ctx = ctx();
        let resolved = resolve_str("2025-02", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2025-02-01T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-03-01T00:00:00Z"));

        let resolved = resolve_str("2025-02 to 2025-04", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2025-02-01T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-01T00:00:00Z"));
        assert_eq!(resolved.grain, Some(Grain::Month));
    }

    #[test]
    fn test_ordinal_selection() {
        let ctx = ctx();
        let resolved = resolve_str("Y2024 M5", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2024-05-01T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2024-06-01T00:00:00Z"));

        // fifth month of the reference year
        let resolved = resolve_str("M5", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2025-05-01T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-06-01T00:00:00Z"));

        // second 7-day block of May
        let resolved = resolve_str("M5 W2", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2025-05-08T00:00:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-15T00:00:00Z"));
    }

    #[test]
    fn test_expression_timezone_wins() {
        // Kathmandu is UTC+5:45; start of "today" there is 18:15 UTC the
        // previous day
        let resolved = resolve_str("DTD tz Asia/Kathmandu", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2025-05-13T18:15:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-05-14T13:43:00Z"));
    }

    #[test]
    fn test_context_timezone_applies() {
        let ctx = ctx().timezone(Tz::America__New_York);
        // 2025-05-14 13:43 UTC is 09:43 in New York; its day starts at
        // 04:00 UTC
        let resolved = resolve_str("DTD", &ctx);
        assert_eq!(resolved.start.unwrap(), utc("2025-05-14T04:00:00Z"));
    }

    #[test]
    fn test_stale_context_just_re_resolves() {
        let fresh = ctx();
        let stale = ReferenceContext::new(fresh.now - Duration::hours(2));
        let expr = parse("-1d, now/d").unwrap();
        let a = resolve(&expr, &stale).unwrap();
        let b = resolve(&expr, &fresh).unwrap();
        assert_eq!(a.duration(), Some(Duration::days(1)));
        assert_eq!(a.duration(), b.duration());
    }

    #[test]
    fn test_positive_shorthand_looks_forward() {
        let resolved = resolve_str("1Q", &ctx());
        // reference is inside Q2 2025; one quarter forward, snapped
        assert_eq!(resolved.start.unwrap(), utc("2025-05-14T13:43:00Z"));
        assert_eq!(resolved.end.unwrap(), utc("2025-07-01T00:00:00Z"));
    }

    #[test]
    fn test_display_grain_rounds_boundaries() {
        let resolved = resolve_str("-7d, now : d", &ctx());
        assert_eq!(resolved.start.unwrap(), utc("2025-05-07T00:00:00Z"));
        // the open end rounds down to the start of today
        assert_eq!(resolved.end.unwrap(), utc("2025-05-14T00:00:00Z"));
    }
}
