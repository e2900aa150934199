//! Reference context and resolved intervals
//!
//! A [`ReferenceContext`] carries the live instants an expression resolves
//! against: the current time, the bounds of available data and the
//! watermark of the last complete period. The context is supplied by the
//! caller (typically from a metrics backend summary); this crate never
//! fetches it and tolerates being re-invoked with a stale one.

use chrono::{DateTime, Duration, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use crate::grain::Grain;

/// The instants an expression resolves against
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceContext {
    /// The current time
    pub now: DateTime<Utc>,
    /// Start of available data
    pub earliest: Option<DateTime<Utc>>,
    /// Exclusive end of available data
    pub latest: Option<DateTime<Utc>>,
    /// Boundary of the last complete period
    pub watermark: Option<DateTime<Utc>>,
    /// Timezone expressions resolve in unless they carry their own
    pub timezone: Tz,
    /// Which weekday begins a week, for week truncation
    pub week_start: Weekday,
}

impl ReferenceContext {
    /// Create a context with only the current time; UTC, Monday weeks
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            earliest: None,
            latest: None,
            watermark: None,
            timezone: Tz::UTC,
            week_start: Weekday::Mon,
        }
    }

    /// Builder method: set the earliest data instant
    pub fn earliest(mut self, earliest: DateTime<Utc>) -> Self {
        self.earliest = Some(earliest);
        self
    }

    /// Builder method: set the latest data instant
    pub fn latest(mut self, latest: DateTime<Utc>) -> Self {
        self.latest = Some(latest);
        self
    }

    /// Builder method: set the watermark
    pub fn watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = Some(watermark);
        self
    }

    /// Builder method: set the resolution timezone
    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Builder method: set the first day of the week
    pub fn week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }
}

/// A concrete window produced by resolution
///
/// Endpoints are `None` only for the all-time range. Serializes endpoints
/// as RFC 3339 strings, matching the backend resolver's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInterval {
    /// Start instant (inclusive)
    #[serde(serialize_with = "serialize_instant")]
    pub start: Option<DateTime<Tz>>,
    /// End instant (exclusive)
    #[serde(serialize_with = "serialize_instant")]
    pub end: Option<DateTime<Tz>>,
    /// Effective display grain
    pub grain: Option<Grain>,
    /// Whether the window is still accumulating data
    pub is_complete: bool,
}

fn serialize_instant<S>(value: &Option<DateTime<Tz>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(instant) => serializer.serialize_some(&instant.to_rfc3339()),
        None => serializer.serialize_none(),
    }
}

impl ResolvedInterval {
    /// The window's length, when bounded
    pub fn duration(&self) -> Option<Duration> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => Some(end.clone() - start.clone()),
            _ => None,
        }
    }

    /// True for the unbounded all-time window
    pub fn is_all_time(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_context_builder() {
        let now = "2025-05-14T13:43:00Z".parse().unwrap();
        let ctx = ReferenceContext::new(now)
            .watermark("2025-05-14T00:00:00Z".parse().unwrap())
            .timezone(Tz::America__New_York)
            .week_start(Weekday::Sun);
        assert_eq!(ctx.now, now);
        assert!(ctx.watermark.is_some());
        assert!(ctx.earliest.is_none());
        assert_eq!(ctx.timezone, Tz::America__New_York);
    }

    #[test]
    fn test_resolved_interval_duration() {
        let start = Tz::UTC.with_ymd_and_hms(2025, 5, 7, 0, 0, 0).unwrap();
        let end = Tz::UTC.with_ymd_and_hms(2025, 5, 14, 0, 0, 0).unwrap();
        let interval = ResolvedInterval {
            start: Some(start),
            end: Some(end),
            grain: Some(Grain::Day),
            is_complete: false,
        };
        assert_eq!(interval.duration(), Some(Duration::days(7)));
        assert!(!interval.is_all_time());
    }

    #[test]
    fn test_wire_shape() {
        let interval = ResolvedInterval {
            start: Some(Tz::UTC.with_ymd_and_hms(2025, 5, 7, 0, 0, 0).unwrap()),
            end: None,
            grain: Some(Grain::Hour),
            is_complete: true,
        };
        let json = serde_json::to_value(&interval).unwrap();
        assert_eq!(json["start"], "2025-05-07T00:00:00+00:00");
        assert_eq!(json["end"], serde_json::Value::Null);
        assert_eq!(json["grain"], "HOUR");
        assert_eq!(json["is_complete"], true);
    }
}
