//! Time grains
//!
//! A `Grain` is a unit of time granularity, from millisecond up to year,
//! totally ordered from finest to coarsest. Grains drive three things:
//! truncation of instants to period boundaries ("snap"), calendar-aware
//! offset arithmetic, and selection of the effective display grain.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone,
    Timelike, Weekday,
};
use serde::{Deserialize, Serialize};

/// A unit of time granularity, ordered finest to coarsest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Grain {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Grain {
    /// All grains, finest first
    pub fn all() -> &'static [Grain] {
        &[
            Grain::Millisecond,
            Grain::Second,
            Grain::Minute,
            Grain::Hour,
            Grain::Day,
            Grain::Week,
            Grain::Month,
            Grain::Quarter,
            Grain::Year,
        ]
    }

    /// Canonical single-token code used by the grammar.
    ///
    /// Minute and month are case-sensitive (`m` vs `M`); everything else is
    /// accepted case-insensitively by the parser.
    pub fn code(&self) -> &'static str {
        match self {
            Grain::Millisecond => "ms",
            Grain::Second => "s",
            Grain::Minute => "m",
            Grain::Hour => "h",
            Grain::Day => "d",
            Grain::Week => "w",
            Grain::Month => "M",
            Grain::Quarter => "Q",
            Grain::Year => "y",
        }
    }

    /// Lowercase period name ("day", "week", ...)
    pub fn period_name(&self) -> &'static str {
        match self {
            Grain::Millisecond => "millisecond",
            Grain::Second => "second",
            Grain::Minute => "minute",
            Grain::Hour => "hour",
            Grain::Day => "day",
            Grain::Week => "week",
            Grain::Month => "month",
            Grain::Quarter => "quarter",
            Grain::Year => "year",
        }
    }

    /// The finer of two grains
    pub fn finer_of(a: Grain, b: Grain) -> Grain {
        a.min(b)
    }

    /// True if `self` is strictly finer than `other`
    pub fn is_finer_than(&self, other: Grain) -> bool {
        *self < other
    }

    /// Truncate an instant to the start of this grain's period
    ///
    /// Operates on local wall-clock time in the instant's timezone.
    /// `week_start` decides which weekday begins a week.
    pub fn truncate<Z: TimeZone>(&self, dt: &DateTime<Z>, week_start: Weekday) -> DateTime<Z> {
        let naive = dt.naive_local();
        let truncated = self.truncate_naive(naive, week_start);
        from_local(&dt.timezone(), truncated)
    }

    fn truncate_naive(&self, dt: NaiveDateTime, week_start: Weekday) -> NaiveDateTime {
        match self {
            Grain::Millisecond => dt
                .with_nanosecond(dt.nanosecond() / 1_000_000 * 1_000_000)
                .unwrap_or(dt),
            Grain::Second => dt.with_nanosecond(0).unwrap_or(dt),
            Grain::Minute => dt
                .with_second(0)
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
            Grain::Hour => dt
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
            Grain::Day => dt.date().and_hms_opt(0, 0, 0).unwrap_or(dt),
            Grain::Week => {
                let days_in = (dt.weekday().num_days_from_monday() + 7
                    - week_start.num_days_from_monday())
                    % 7;
                let monday = dt.date() - Duration::days(days_in as i64);
                monday.and_hms_opt(0, 0, 0).unwrap_or(dt)
            }
            Grain::Month => NaiveDate::from_ymd_opt(dt.year(), dt.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(dt),
            Grain::Quarter => {
                let quarter_month = (dt.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(dt.year(), quarter_month, 1)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .unwrap_or(dt)
            }
            Grain::Year => NaiveDate::from_ymd_opt(dt.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(dt),
        }
    }

    /// Add `n` of this grain to an instant (n may be negative)
    ///
    /// Month and coarser use calendar arithmetic; day and week keep the
    /// local wall-clock time across DST changes; hour and finer are
    /// absolute durations.
    pub fn add_to<Z: TimeZone>(&self, dt: &DateTime<Z>, n: i64) -> DateTime<Z> {
        match self {
            Grain::Millisecond => checked_shift(dt, Duration::milliseconds(n)),
            Grain::Second => checked_shift(dt, Duration::seconds(n)),
            Grain::Minute => checked_shift(dt, Duration::minutes(n)),
            Grain::Hour => checked_shift(dt, Duration::hours(n)),
            Grain::Day => shift_wall_clock(dt, Duration::days(n)),
            Grain::Week => shift_wall_clock(dt, Duration::weeks(n)),
            Grain::Month => shift_months(dt, n),
            Grain::Quarter => shift_months(dt, n * 3),
            Grain::Year => shift_months(dt, n * 12),
        }
    }
}

impl std::fmt::Display for Grain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pick the effective display grain from the expression-implied grain, the
/// user's selection, and the dataset's minimum allowed grain.
///
/// The user's choice wins unless it is finer than the minimum; next the
/// expression-implied grain, under the same condition; otherwise the
/// minimum itself.
pub fn select_grain(
    expr_grain: Option<Grain>,
    user_grain: Option<Grain>,
    min_grain: Grain,
) -> Grain {
    if let Some(user) = user_grain {
        if !user.is_finer_than(min_grain) {
            return user;
        }
    }
    if let Some(expr) = expr_grain {
        if !expr.is_finer_than(min_grain) {
            return expr;
        }
    }
    min_grain
}

fn checked_shift<Z: TimeZone>(dt: &DateTime<Z>, delta: Duration) -> DateTime<Z> {
    dt.clone().checked_add_signed(delta).unwrap_or_else(|| dt.clone())
}

fn shift_wall_clock<Z: TimeZone>(dt: &DateTime<Z>, delta: Duration) -> DateTime<Z> {
    let naive = dt
        .naive_local()
        .checked_add_signed(delta)
        .unwrap_or_else(|| dt.naive_local());
    from_local(&dt.timezone(), naive)
}

fn shift_months<Z: TimeZone>(dt: &DateTime<Z>, months: i64) -> DateTime<Z> {
    let naive = dt.naive_local();
    let shifted = if months >= 0 {
        naive.checked_add_months(Months::new(months as u32))
    } else {
        naive.checked_sub_months(Months::new(months.unsigned_abs() as u32))
    }
    .unwrap_or(naive);
    from_local(&dt.timezone(), shifted)
}

/// Reattach a timezone to a local wall-clock time.
///
/// Ambiguous local times (fall-back) take the earlier offset; nonexistent
/// ones (spring-forward gap) step forward to the next valid instant.
pub(crate) fn from_local<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> DateTime<Z> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, _) => earlier,
        LocalResult::None => {
            let mut probe = naive;
            for _ in 0..3 {
                probe = probe + Duration::hours(1);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}
