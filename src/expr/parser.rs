//! RillTime Expression Parser
//!
//! Parses RillTime strings into the [`crate::expr::ast`] model.
//!
//! # Supported Syntax
//!
//! ```text
//! rill_time      := interval (":" grain)? (("@" | "as of") point)* ("tz" zone)?
//! interval       := "inf" | grain "TD" | point "," point | ordinal
//!                 | iso ("to" iso)? | shorthand
//! point          := (label | iso)? signed_part* ("/" grain)*
//! shorthand      := signed_part+                    // "-7d", "3w18d23h"
//! ordinal        := GRAIN index (ws GRAIN index)*   // "Y2024 M5"
//! label          := now | earliest | latest | watermark | ref
//! ```
//!
//! # Examples
//!
//! ```text
//! -7d, now/d : h
//! DTD
//! 1Q as of 2025-02-25T09:00:00Z-8W/Q
//! -7d tz Asia/Kathmandu
//! ```
//!
//! Each accepted string has exactly one derivation: the interval
//! alternatives are tried in an order where no prefix of one shape is a
//! complete parse of another, and repeated offset units are rejected.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1, take_while_m_n},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map_res, opt, value},
    multi::{many0, many1},
    sequence::{delimited, preceded, tuple},
    IResult,
};

use chrono_tz::Tz;

use crate::expr::alias;
use crate::expr::ast::{
    AbsDate, AnchorLabel, GrainDuration, Interval, OrdinalPart, PointBase, PointInTime,
    RillTime,
};
use crate::expr::error::{ParseError, ParseResult};
use crate::grain::Grain;

/// Parse a RillTime expression string
///
/// Legacy aliases and ISO-8601 durations are normalized to canonical
/// grammar first. Parsing is pure; the same input always yields the same
/// expression.
pub fn parse(input: &str) -> ParseResult<RillTime> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(ParseError::Syntax("empty expression".to_string()));
    }
    tracing::trace!(expression = raw, "parsing rill-time expression");

    let canonical = alias::normalize(raw);
    match parse_rill_time(canonical.as_ref()) {
        Ok((rest, (interval, grain, overrides, timezone))) => {
            if !rest.trim().is_empty() {
                return Err(ParseError::Syntax(format!(
                    "unexpected input after expression: '{}'",
                    rest.trim()
                )));
            }
            let timezone = match timezone {
                Some(name) => Some(
                    name.parse::<Tz>()
                        .map_err(|_| ParseError::UnknownTimezone(name.to_string()))?,
                ),
                None => None,
            };
            Ok(RillTime {
                raw: raw.to_string(),
                interval,
                overrides,
                grain,
                timezone,
            })
        }
        Err(e) => Err(ParseError::Syntax(format!("{:?}", e))),
    }
}

type Parsed<'a> = (Interval, Option<Grain>, Vec<PointInTime>, Option<&'a str>);

fn parse_rill_time(input: &str) -> IResult<&str, Parsed<'_>> {
    let (rest, _) = multispace0(input)?;
    let (rest, interval) = parse_interval(rest)?;
    let (rest, grain) = opt(preceded(
        delimited(multispace0, char(':'), multispace0),
        parse_grain,
    ))(rest)?;
    let (rest, overrides) = many0(parse_override)(rest)?;
    let (rest, timezone) = opt(parse_timezone)(rest)?;
    Ok((rest, (interval, grain, overrides, timezone)))
}

fn parse_interval(input: &str) -> IResult<&str, Interval> {
    alt((
        value(Interval::AllTime, tag_no_case("inf")),
        parse_period_to_grain,
        parse_start_end,
        parse_iso,
        parse_ordinal,
        parse_shorthand,
    ))(input)
}

/// Parse a period-to-date interval like "DTD" or "WTD"
fn parse_period_to_grain(input: &str) -> IResult<&str, Interval> {
    let (rest, grain) = parse_grain(input)?;
    let (rest, _) = tag("TD")(rest)?;
    if grain < Grain::Day {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, Interval::PeriodToGrain(grain)))
}

/// Parse an explicit start/end pair like "-7d, now/d"
fn parse_start_end(input: &str) -> IResult<&str, Interval> {
    let (rest, start) = parse_point(input)?;
    let (rest, _) = delimited(multispace0, char(','), multispace0)(rest)?;
    let (rest, end) = parse_point(rest)?;
    Ok((rest, Interval::StartEnd { start, end }))
}

/// Parse an ISO literal interval like "2025-02" or "2025-02 to 2025-04"
fn parse_iso(input: &str) -> IResult<&str, Interval> {
    let (rest, start) = parse_abs_date(input)?;
    let (rest, end) = opt(preceded(
        delimited(multispace1, tag_no_case("to"), multispace1),
        parse_abs_date,
    ))(rest)?;
    Ok((rest, Interval::Iso { start, end }))
}

/// Parse an ordinal interval like "Y2024 M5"
fn parse_ordinal(input: &str) -> IResult<&str, Interval> {
    let (rest, first) = parse_ordinal_part(input)?;
    let (rest, mut parts) = many0(preceded(multispace1, parse_ordinal_part))(rest)?;
    parts.insert(0, first);
    // parts must strictly narrow, coarse to fine
    for pair in parts.windows(2) {
        if pair[1].grain >= pair[0].grain {
            return failure(input);
        }
    }
    Ok((rest, Interval::Ordinal(parts)))
}

fn parse_ordinal_part(input: &str) -> IResult<&str, OrdinalPart> {
    let (rest, grain) = parse_grain(input)?;
    if grain < Grain::Day {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (rest, index) = map_res(digit1, |s: &str| s.parse::<u32>())(rest)?;
    if index == 0 {
        return failure(input);
    }
    Ok((rest, OrdinalPart { grain, index }))
}

/// Parse a duration-only shorthand like "-7d" or "3w18d23h"
fn parse_shorthand(input: &str) -> IResult<&str, Interval> {
    let (rest, offset) = parse_offset(input)?;
    Ok((rest, Interval::Shorthand(offset)))
}

/// Parse a point in time: base anchor, offset parts, snap grains
fn parse_point(input: &str) -> IResult<&str, PointInTime> {
    alt((parse_labelled_point, parse_absolute_point, parse_relative_point))(input)
}

fn parse_labelled_point(input: &str) -> IResult<&str, PointInTime> {
    let (rest, label) = parse_anchor_label(input)?;
    let (rest, parts) = many0(parse_signed_part)(rest)?;
    let (rest, snaps) = parse_snaps(rest)?;
    match GrainDuration::from_parts(&parts) {
        Some(offset) => Ok((
            rest,
            PointInTime {
                base: PointBase::Labelled(label),
                offset,
                snaps,
            },
        )),
        None => failure(input),
    }
}

fn parse_absolute_point(input: &str) -> IResult<&str, PointInTime> {
    let (rest, date) = parse_abs_date(input)?;
    let (rest, parts) = many0(parse_signed_part)(rest)?;
    let (rest, snaps) = parse_snaps(rest)?;
    match GrainDuration::from_parts(&parts) {
        Some(offset) => Ok((
            rest,
            PointInTime {
                base: PointBase::Absolute(date),
                offset,
                snaps,
            },
        )),
        None => failure(input),
    }
}

fn parse_relative_point(input: &str) -> IResult<&str, PointInTime> {
    let (rest, offset) = parse_offset(input)?;
    let (rest, snaps) = parse_snaps(rest)?;
    Ok((
        rest,
        PointInTime {
            base: PointBase::GrainRelative,
            offset,
            snaps,
        },
    ))
}

fn parse_anchor_label(input: &str) -> IResult<&str, AnchorLabel> {
    alt((
        value(AnchorLabel::Now, tag_no_case("now")),
        value(AnchorLabel::Earliest, tag_no_case("earliest")),
        value(AnchorLabel::Latest, tag_no_case("latest")),
        value(AnchorLabel::Watermark, tag_no_case("watermark")),
        value(AnchorLabel::Ref, tag_no_case("ref")),
    ))(input)
}

/// Parse one or more signed grain parts into a normalized duration,
/// rejecting repeated units ("3d4d")
fn parse_offset(input: &str) -> IResult<&str, GrainDuration> {
    let (rest, parts) = many1(parse_signed_part)(input)?;
    match GrainDuration::from_parts(&parts) {
        Some(offset) => Ok((rest, offset)),
        None => failure(input),
    }
}

fn parse_signed_part(input: &str) -> IResult<&str, (Grain, i64)> {
    let (rest, sign) = opt(alt((char('+'), char('-'))))(input)?;
    let (rest, n) = map_res(digit1, |s: &str| s.parse::<i64>())(rest)?;
    let (rest, grain) = parse_grain(rest)?;
    let n = if sign == Some('-') { -n } else { n };
    Ok((rest, (grain, n)))
}

fn parse_snaps(input: &str) -> IResult<&str, Vec<Grain>> {
    many0(preceded(char('/'), parse_grain))(input)
}

/// Parse a grain code. Minute (`m`) and month (`M`) are case-sensitive;
/// every other code is accepted in either case.
fn parse_grain(input: &str) -> IResult<&str, Grain> {
    alt((
        value(Grain::Millisecond, tag("ms")),
        value(Grain::Month, tag("M")),
        value(Grain::Minute, tag("m")),
        value(Grain::Second, tag_no_case("s")),
        value(Grain::Hour, tag_no_case("h")),
        value(Grain::Day, tag_no_case("d")),
        value(Grain::Week, tag_no_case("w")),
        value(Grain::Quarter, tag_no_case("q")),
        value(Grain::Year, tag_no_case("y")),
    ))(input)
}

/// Parse a partial calendar literal like "2025-02-25T09:00:00Z"
fn parse_abs_date(input: &str) -> IResult<&str, AbsDate> {
    let (rest, year) = map_res(
        take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<i32>(),
    )(input)?;
    let (rest, month) = opt(preceded(char('-'), parse_two_digits))(rest)?;
    let (rest, day) = match month {
        Some(_) => opt(preceded(char('-'), parse_two_digits))(rest)?,
        None => (rest, None),
    };
    let (rest, time) = match day {
        Some(_) => opt(preceded(char('T'), parse_time))(rest)?,
        None => (rest, None),
    };
    let (rest, zulu) = opt(char('Z'))(rest)?;

    let (hour, minute, second) = match time {
        Some((hour, minute, second)) => (Some(hour), Some(minute), second),
        None => (None, None, None),
    };
    let date = AbsDate {
        year,
        month,
        day,
        hour,
        minute,
        second,
        utc: zulu.is_some(),
    };
    // reject literals that do not name a real calendar instant
    if date.naive().is_none() {
        return failure(input);
    }
    Ok((rest, date))
}

fn parse_time(input: &str) -> IResult<&str, (u32, u32, Option<u32>)> {
    let (rest, hour) = parse_two_digits(input)?;
    let (rest, _) = char(':')(rest)?;
    let (rest, minute) = parse_two_digits(rest)?;
    let (rest, second) = opt(preceded(char(':'), parse_two_digits))(rest)?;
    Ok((rest, (hour, minute, second)))
}

fn parse_two_digits(input: &str) -> IResult<&str, u32> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u32>(),
    )(input)
}

/// Parse an anchor override: "@ point" or "as of point"
fn parse_override(input: &str) -> IResult<&str, PointInTime> {
    let (rest, _) = alt((
        value((), delimited(multispace0, char('@'), multispace0)),
        value(
            (),
            tuple((
                multispace1,
                tag_no_case("as"),
                multispace1,
                tag_no_case("of"),
                multispace1,
            )),
        ),
    ))(input)?;
    parse_point(rest)
}

fn parse_timezone(input: &str) -> IResult<&str, &str> {
    preceded(
        tuple((multispace1, tag_no_case("tz"), multispace1)),
        take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-')),
    )(input)
}

/// An unrecoverable parse error: the input matched a shape but violates
/// one of its rules, so backtracking to another shape would be ambiguous
fn failure<T>(input: &str) -> IResult<&str, T> {
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let expr = parse("-7d").unwrap();
        assert_eq!(
            expr.interval,
            Interval::Shorthand(GrainDuration::of(Grain::Day, -7))
        );
        assert!(expr.overrides.is_empty());
        assert!(expr.grain.is_none());
        assert!(expr.timezone.is_none());
    }

    #[test]
    fn test_parse_compound_shorthand() {
        let expr = parse("3w18d23h").unwrap();
        let expected = GrainDuration::from_parts(&[
            (Grain::Week, 3),
            (Grain::Day, 18),
            (Grain::Hour, 23),
        ])
        .unwrap();
        assert_eq!(expr.interval, Interval::Shorthand(expected));
    }

    #[test]
    fn test_parse_rejects_repeated_units() {
        assert!(parse("3d4d").is_err());
        assert!(parse("now-1h-2h,now").is_err());
    }

    #[test]
    fn test_parse_start_end_with_snaps() {
        let expr = parse("-7d, now/d").unwrap();
        match &expr.interval {
            Interval::StartEnd { start, end } => {
                assert_eq!(start.base, PointBase::GrainRelative);
                assert_eq!(start.offset, GrainDuration::of(Grain::Day, -7));
                assert_eq!(end.base, PointBase::Labelled(AnchorLabel::Now));
                assert_eq!(end.snaps, vec![Grain::Day]);
            }
            other => panic!("expected StartEnd, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_display_grain() {
        let expr = parse("-7d, now/d : h").unwrap();
        assert_eq!(expr.grain, Some(Grain::Hour));
        // whitespace around the colon is incidental
        let tight = parse("-7d,now/d:h").unwrap();
        assert_eq!(tight.grain, Some(Grain::Hour));
    }

    #[test]
    fn test_parse_period_to_grain() {
        assert_eq!(parse("DTD").unwrap().interval, Interval::PeriodToGrain(Grain::Day));
        assert_eq!(parse("WTD").unwrap().interval, Interval::PeriodToGrain(Grain::Week));
        assert_eq!(parse("MTD").unwrap().interval, Interval::PeriodToGrain(Grain::Month));
        assert_eq!(parse("QTD").unwrap().interval, Interval::PeriodToGrain(Grain::Quarter));
        assert_eq!(parse("YTD").unwrap().interval, Interval::PeriodToGrain(Grain::Year));
        // no sub-day periods to date
        assert!(parse("hTD").is_err());
    }

    #[test]
    fn test_parse_minute_month_case_sensitivity() {
        assert_eq!(
            parse("-5m").unwrap().interval,
            Interval::Shorthand(GrainDuration::of(Grain::Minute, -5))
        );
        assert_eq!(
            parse("-5M").unwrap().interval,
            Interval::Shorthand(GrainDuration::of(Grain::Month, -5))
        );
        assert_eq!(
            parse("-5ms").unwrap().interval,
            Interval::Shorthand(GrainDuration::of(Grain::Millisecond, -5))
        );
    }

    #[test]
    fn test_parse_labels() {
        let expr = parse("earliest, latest").unwrap();
        match &expr.interval {
            Interval::StartEnd { start, end } => {
                assert_eq!(start.base, PointBase::Labelled(AnchorLabel::Earliest));
                assert_eq!(end.base, PointBase::Labelled(AnchorLabel::Latest));
            }
            other => panic!("expected StartEnd, got {:?}", other),
        }
        let expr = parse("watermark-6h, watermark").unwrap();
        match &expr.interval {
            Interval::StartEnd { start, .. } => {
                assert_eq!(start.offset, GrainDuration::of(Grain::Hour, -6));
            }
            other => panic!("expected StartEnd, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_anchor_override() {
        let expr = parse("1Q as of 2025-02-25T09:00:00Z-8W/Q").unwrap();
        assert_eq!(
            expr.interval,
            Interval::Shorthand(GrainDuration::of(Grain::Quarter, 1))
        );
        assert_eq!(expr.overrides.len(), 1);
        let point = &expr.overrides[0];
        match &point.base {
            PointBase::Absolute(date) => {
                assert_eq!(date.year, 2025);
                assert_eq!(date.month, Some(2));
                assert_eq!(date.day, Some(25));
                assert_eq!(date.hour, Some(9));
                assert!(date.utc);
            }
            other => panic!("expected absolute base, got {:?}", other),
        }
        assert_eq!(point.offset, GrainDuration::of(Grain::Week, -8));
        assert_eq!(point.snaps, vec![Grain::Quarter]);
    }

    #[test]
    fn test_parse_at_override_equals_as_of() {
        let a = parse("1Q @ watermark/d").unwrap();
        let b = parse("1Q as of watermark/d").unwrap();
        assert_eq!(a.overrides, b.overrides);
    }

    #[test]
    fn test_parse_overrides_compose() {
        let expr = parse("DTD as of watermark @ -1d").unwrap();
        assert_eq!(expr.overrides.len(), 2);
    }

    #[test]
    fn test_parse_timezone_suffix() {
        let expr = parse("-7d tz Asia/Kathmandu").unwrap();
        assert_eq!(expr.timezone, Some(chrono_tz::Tz::Asia__Kathmandu));
        assert!(matches!(
            parse("-7d tz Nowhere/Special"),
            Err(ParseError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn test_parse_ordinal() {
        let expr = parse("Y2024 M5").unwrap();
        match &expr.interval {
            Interval::Ordinal(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], OrdinalPart { grain: Grain::Year, index: 2024 });
                assert_eq!(parts[1], OrdinalPart { grain: Grain::Month, index: 5 });
            }
            other => panic!("expected Ordinal, got {:?}", other),
        }
        // parts must narrow
        assert!(parse("W2 M5").is_err());
        assert!(parse("M0").is_err());
    }

    #[test]
    fn test_parse_iso_range() {
        let expr = parse("2025-02 to 2025-04").unwrap();
        match &expr.interval {
            Interval::Iso { start, end } => {
                assert_eq!(start.month, Some(2));
                assert_eq!(end.unwrap().month, Some(4));
            }
            other => panic!("expected Iso, got {:?}", other),
        }
        let expr = parse("2025-02-25").unwrap();
        assert!(matches!(expr.interval, Interval::Iso { end: None, .. }));
    }

    #[test]
    fn test_parse_rejects_invalid_dates() {
        assert!(parse("2025-13-01").is_err());
        assert!(parse("2025-02-30").is_err());
        assert!(parse("2025-02-25T25:00").is_err());
    }

    #[test]
    fn test_parse_legacy_aliases() {
        assert_eq!(parse("rill-TD").unwrap().interval, Interval::PeriodToGrain(Grain::Day));
        assert_eq!(
            parse("P7D").unwrap().interval,
            Interval::Shorthand(GrainDuration::of(Grain::Day, -7))
        );
        assert_eq!(parse("inf").unwrap().interval, Interval::AllTime);
        // the raw text is preserved even when normalized
        assert_eq!(parse("rill-TD").unwrap().raw(), "rill-TD");
    }

    #[test]
    fn test_parse_truncated_input_fails() {
        assert!(parse("-7d to").is_err());
        assert!(parse("-7d,").is_err());
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("bogus").is_err());
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert!(parse("  -7d, now/d : h  ").is_ok());
        assert!(parse("-7d ,  now/d").is_ok());
    }
}
