//! RillTime Abstract Syntax Tree
//!
//! Defines the semantic model for RillTime expressions, a compact language
//! for relative time ranges:
//!
//! ```text
//! -7d, now/d : h          last 7 days, hourly
//! DTD                     day to date
//! 1Q as of -8w/Q          one quarter, anchored 8 weeks back
//! 2025-02 to 2025-04      February through April
//! ```
//!
//! Every interval shape is a variant of the closed [`Interval`] sum type,
//! so adding a shape is a compile-time-checked change. Offset-based shapes
//! all expand to an equivalent start/end pair before resolution, keeping a
//! single resolution code path.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::grain::{from_local, Grain};

/// A value paired with whether the expression shape actually supports it
///
/// Labels and completeness checks are only meaningful for a subset of
/// expression shapes; unsupported shapes return their fallback value with
/// `supported == false` rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supported<T> {
    pub value: T,
    pub supported: bool,
}

impl<T> Supported<T> {
    /// A supported value
    pub fn yes(value: T) -> Self {
        Self {
            value,
            supported: true,
        }
    }

    /// A fallback value the caller should not rely on
    pub fn no(value: T) -> Self {
        Self {
            value,
            supported: false,
        }
    }
}

/// Named reference instants an expression can anchor on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorLabel {
    /// The current time
    Now,
    /// Start of available data
    Earliest,
    /// Exclusive end of available data
    Latest,
    /// Boundary of the last complete period
    Watermark,
    /// The expression's reference instant (now unless overridden)
    Ref,
}

impl AnchorLabel {
    pub fn name(&self) -> &'static str {
        match self {
            AnchorLabel::Now => "now",
            AnchorLabel::Earliest => "earliest",
            AnchorLabel::Latest => "latest",
            AnchorLabel::Watermark => "watermark",
            AnchorLabel::Ref => "ref",
        }
    }
}

impl std::fmt::Display for AnchorLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A signed duration normalized across calendar units
///
/// Compound offsets like `3w18d23h` keep one count per unit; a unit may
/// appear at most once per offset. Month and coarser units are applied
/// with calendar arithmetic, so a `GrainDuration` is not reducible to a
/// fixed number of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GrainDuration {
    pub millis: i64,
    pub seconds: i64,
    pub minutes: i64,
    pub hours: i64,
    pub days: i64,
    pub weeks: i64,
    pub months: i64,
    pub quarters: i64,
    pub years: i64,
}

/// A `GrainDuration` reduced to its non-zero units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduced {
    /// No non-zero units
    Zero,
    /// Exactly one non-zero unit
    Single(Grain, i64),
    /// More than one non-zero unit
    Mixed,
}

impl GrainDuration {
    /// Build from (grain, count) parts, rejecting repeated units
    pub fn from_parts(parts: &[(Grain, i64)]) -> Option<Self> {
        let mut out = Self::default();
        for (grain, n) in parts {
            let slot = out.slot_mut(*grain);
            if *slot != 0 {
                return None;
            }
            *slot = *n;
        }
        Some(out)
    }

    /// A single-unit duration
    pub fn of(grain: Grain, n: i64) -> Self {
        let mut out = Self::default();
        *out.slot_mut(grain) = n;
        out
    }

    pub fn is_zero(&self) -> bool {
        self.units().iter().all(|(_, n)| *n == 0)
    }

    /// Count for a specific unit
    pub fn get(&self, grain: Grain) -> i64 {
        self.units()
            .iter()
            .find(|(g, _)| *g == grain)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    /// Component-wise sum
    pub fn plus(&self, other: &GrainDuration) -> GrainDuration {
        GrainDuration {
            millis: self.millis + other.millis,
            seconds: self.seconds + other.seconds,
            minutes: self.minutes + other.minutes,
            hours: self.hours + other.hours,
            days: self.days + other.days,
            weeks: self.weeks + other.weeks,
            months: self.months + other.months,
            quarters: self.quarters + other.quarters,
            years: self.years + other.years,
        }
    }

    /// Finest non-zero unit
    pub fn finest(&self) -> Option<Grain> {
        self.units()
            .iter()
            .find(|(_, n)| *n != 0)
            .map(|(g, _)| *g)
    }

    /// Sign of the coarsest non-zero unit; decides which side of the
    /// reference a shorthand window falls on
    pub fn direction(&self) -> i64 {
        self.units()
            .iter()
            .rev()
            .find(|(_, n)| *n != 0)
            .map(|(_, n)| n.signum())
            .unwrap_or(0)
    }

    /// Reduce to zero / single-unit / mixed
    pub fn reduced(&self) -> Reduced {
        let mut single = None;
        for (grain, n) in self.units() {
            if n != 0 {
                if single.is_some() {
                    return Reduced::Mixed;
                }
                single = Some((grain, n));
            }
        }
        match single {
            Some((grain, n)) => Reduced::Single(grain, n),
            None => Reduced::Zero,
        }
    }

    /// Apply the offset to an instant, coarsest units first
    pub fn apply<Z: TimeZone>(&self, dt: &DateTime<Z>) -> DateTime<Z> {
        let mut out = dt.clone();
        for (grain, n) in self.units().iter().rev() {
            if *n != 0 {
                out = grain.add_to(&out, *n);
            }
        }
        out
    }

    fn units(&self) -> [(Grain, i64); 9] {
        [
            (Grain::Millisecond, self.millis),
            (Grain::Second, self.seconds),
            (Grain::Minute, self.minutes),
            (Grain::Hour, self.hours),
            (Grain::Day, self.days),
            (Grain::Week, self.weeks),
            (Grain::Month, self.months),
            (Grain::Quarter, self.quarters),
            (Grain::Year, self.years),
        ]
    }

    fn slot_mut(&mut self, grain: Grain) -> &mut i64 {
        match grain {
            Grain::Millisecond => &mut self.millis,
            Grain::Second => &mut self.seconds,
            Grain::Minute => &mut self.minutes,
            Grain::Hour => &mut self.hours,
            Grain::Day => &mut self.days,
            Grain::Week => &mut self.weeks,
            Grain::Month => &mut self.months,
            Grain::Quarter => &mut self.quarters,
            Grain::Year => &mut self.years,
        }
    }
}

impl std::fmt::Display for GrainDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (grain, n) in self.units().iter().rev() {
            if *n != 0 {
                write!(f, "{}{}", n, grain.code())?;
            }
        }
        Ok(())
    }
}

/// A partial calendar literal (`2025`, `2025-02`, `2025-02-25T09:00:00Z`)
///
/// Missing fields default to the start of the period; the finest present
/// field is the literal's precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    /// Trailing `Z`: interpret as a UTC instant rather than local wall time
    pub utc: bool,
}

impl AbsDate {
    /// The grain of the finest specified field
    pub fn precision(&self) -> Grain {
        if self.second.is_some() {
            Grain::Second
        } else if self.hour.is_some() {
            Grain::Minute
        } else if self.day.is_some() {
            Grain::Day
        } else if self.month.is_some() {
            Grain::Month
        } else {
            Grain::Year
        }
    }

    /// The literal's start boundary as a naive local time, if the calendar
    /// fields form a real date
    pub fn naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
            .and_then(|d| {
                d.and_hms_opt(
                    self.hour.unwrap_or(0),
                    self.minute.unwrap_or(0),
                    self.second.unwrap_or(0),
                )
            })
    }

    /// Interpret the literal in a timezone
    pub fn resolve(&self, tz: &Tz) -> DateTime<Tz> {
        let naive = self.naive().unwrap_or(NaiveDateTime::MIN);
        if self.utc {
            Utc.from_utc_datetime(&naive).with_timezone(tz)
        } else {
            from_local(tz, naive)
        }
    }
}

impl std::fmt::Display for AbsDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
        }
        if let Some(day) = self.day {
            write!(f, "-{:02}", day)?;
        }
        if let (Some(hour), Some(minute)) = (self.hour, self.minute) {
            write!(f, "T{:02}:{:02}", hour, minute)?;
            if let Some(second) = self.second {
                write!(f, ":{:02}", second)?;
            }
        }
        if self.utc {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

/// What a point in time is anchored on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointBase {
    /// A named anchor (`now`, `watermark`, ...)
    Labelled(AnchorLabel),
    /// Offset-only, anchored on the reference instant
    GrainRelative,
    /// A partial calendar literal
    Absolute(AbsDate),
}

/// One endpoint of an interval: base anchor, cumulative offset, snaps
///
/// The offset is applied first, then each snap truncates to a grain
/// boundary, left to right. A point with a non-empty offset and no
/// explicit snaps is aligned to the finest unit of its offset, so `-7d`
/// lands on a day boundary; explicit snaps suppress that alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointInTime {
    pub base: PointBase,
    pub offset: GrainDuration,
    pub snaps: Vec<Grain>,
}

impl PointInTime {
    /// The reference instant, unmodified
    pub fn reference() -> Self {
        Self {
            base: PointBase::Labelled(AnchorLabel::Ref),
            offset: GrainDuration::default(),
            snaps: Vec::new(),
        }
    }

    /// An offset from the reference instant
    pub fn relative(offset: GrainDuration) -> Self {
        Self {
            base: PointBase::GrainRelative,
            offset,
            snaps: Vec::new(),
        }
    }

    /// A named anchor
    pub fn labelled(label: AnchorLabel) -> Self {
        Self {
            base: PointBase::Labelled(label),
            offset: GrainDuration::default(),
            snaps: Vec::new(),
        }
    }

    /// Finest grain mentioned by this point's offset or snaps
    pub fn finest_mentioned(&self) -> Option<Grain> {
        let snap = self.snaps.iter().copied().min();
        match (self.offset.finest(), snap) {
            (Some(a), Some(b)) => Some(Grain::finer_of(a, b)),
            (a, b) => a.or(b),
        }
    }
}

impl std::fmt::Display for PointInTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.base {
            PointBase::Labelled(label) => write!(f, "{}", label)?,
            PointBase::Absolute(date) => write!(f, "{}", date)?,
            // a zero offset like "0d" reduces to the bare reference
            PointBase::GrainRelative if self.offset.is_zero() => write!(f, "ref")?,
            PointBase::GrainRelative => {}
        }
        if !self.offset.is_zero() {
            write!(f, "{}", self.offset)?;
        }
        for snap in &self.snaps {
            write!(f, "/{}", snap.code())?;
        }
        Ok(())
    }
}

/// One `<grain><index>` pair of an ordinal interval (`M5`, `W2`, `Y2024`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdinalPart {
    pub grain: Grain,
    pub index: u32,
}

impl std::fmt::Display for OrdinalPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.grain.code().to_uppercase(), self.index)
    }
}

/// The closed set of interval shapes
#[derive(Debug, Clone, PartialEq)]
pub enum Interval {
    /// `inf`: the unbounded range of all available data
    AllTime,
    /// A duration-only window on one side of the reference (`-7d`, `1Q`)
    Shorthand(GrainDuration),
    /// Period-to-date (`DTD`, `WTD`)
    PeriodToGrain(Grain),
    /// Explicit endpoints (`-7d, now/d`)
    StartEnd {
        start: PointInTime,
        end: PointInTime,
    },
    /// Calendar-positional selection (`Y2024 M5`)
    Ordinal(Vec<OrdinalPart>),
    /// ISO calendar literals (`2025-02`, `2025-02 to 2025-04`)
    Iso {
        start: AbsDate,
        end: Option<AbsDate>,
    },
}

impl Interval {
    /// Finest grain mentioned anywhere in the interval
    ///
    /// Finest is the deliberate choice: it is the most conservative
    /// display resolution for the window.
    pub fn grain(&self) -> Option<Grain> {
        match self {
            Interval::AllTime => None,
            Interval::Shorthand(offset) => offset.finest(),
            Interval::PeriodToGrain(grain) => Some(*grain),
            Interval::StartEnd { start, end } => {
                match (start.finest_mentioned(), end.finest_mentioned()) {
                    (Some(a), Some(b)) => Some(Grain::finer_of(a, b)),
                    (a, b) => a.or(b),
                }
            }
            Interval::Ordinal(parts) => parts.iter().map(|p| p.grain).min(),
            Interval::Iso { start, end } => Some(match end {
                Some(end) => Grain::finer_of(start.precision(), end.precision()),
                None => start.precision(),
            }),
        }
    }

    /// Expand offset-based shapes into an equivalent start/end pair
    ///
    /// Shorthand, period-to-grain and explicit pairs all resolve through
    /// this expansion, so equivalent spellings cannot drift apart.
    /// Ordinal, ISO and all-time shapes have no point form and return
    /// `None`.
    pub fn to_start_end(&self) -> Option<(PointInTime, PointInTime)> {
        match self {
            Interval::Shorthand(offset) => {
                if offset.direction() < 0 {
                    Some((PointInTime::relative(*offset), PointInTime::reference()))
                } else {
                    Some((PointInTime::reference(), PointInTime::relative(*offset)))
                }
            }
            Interval::PeriodToGrain(grain) => Some((
                PointInTime {
                    base: PointBase::Labelled(AnchorLabel::Ref),
                    offset: GrainDuration::default(),
                    snaps: vec![*grain],
                },
                PointInTime::reference(),
            )),
            Interval::StartEnd { start, end } => Some((start.clone(), end.clone())),
            Interval::AllTime | Interval::Ordinal(_) | Interval::Iso { .. } => None,
        }
    }

    /// Whether the window is still accumulating data
    ///
    /// True means the end boundary has not fully elapsed. Only meaningful
    /// when a single grain unit governs the start and end offsets and any
    /// `parent_offset` reduces to a single unit no coarser than it; other
    /// shapes return `(false, supported=false)` and the caller must not
    /// style the window either way.
    pub fn is_complete(&self, parent_offset: Option<&GrainDuration>) -> Supported<bool> {
        let Some((start, end)) = self.to_start_end() else {
            return Supported::no(false);
        };

        let start_unit = match start.offset.reduced() {
            Reduced::Mixed => return Supported::no(false),
            Reduced::Single(grain, _) => Some(grain),
            Reduced::Zero => None,
        };
        let end_unit = match end.offset.reduced() {
            Reduced::Mixed => return Supported::no(false),
            Reduced::Single(grain, _) => Some(grain),
            Reduced::Zero => None,
        };
        let governing = match (start_unit, end_unit) {
            (Some(a), Some(b)) if a != b => return Supported::no(false),
            (Some(grain), _) | (_, Some(grain)) => Some(grain),
            (None, None) => start
                .snaps
                .iter()
                .chain(end.snaps.iter())
                .copied()
                .min(),
        };
        let Some(governing) = governing else {
            return Supported::no(false);
        };

        let parent = match parent_offset.map(|p| p.reduced()) {
            None | Some(Reduced::Zero) => None,
            Some(Reduced::Mixed) => return Supported::no(false),
            Some(Reduced::Single(grain, _)) if grain > governing => {
                return Supported::no(false)
            }
            Some(Reduced::Single(..)) => parent_offset,
        };

        // The check is context-free: evaluate the end boundary against a
        // probe instant strictly inside every grain period.
        let probe = probe_instant();
        let base = match parent {
            Some(parent) => parent.apply(&probe),
            None => probe,
        };
        let mut boundary = end.offset.apply(&base);
        if end.snaps.is_empty() {
            if let Some(grain) = end.offset.finest() {
                boundary = grain.truncate(&boundary, Weekday::Mon);
            }
        } else {
            for grain in &end.snaps {
                boundary = grain.truncate(&boundary, Weekday::Mon);
            }
        }
        Supported::yes(boundary >= probe)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::AllTime => write!(f, "inf"),
            Interval::Shorthand(offset) => write!(f, "{}", offset),
            Interval::PeriodToGrain(grain) => {
                write!(f, "{}TD", grain.code().to_uppercase())
            }
            Interval::StartEnd { start, end } => write!(f, "{}, {}", start, end),
            Interval::Ordinal(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
            Interval::Iso { start, end } => {
                write!(f, "{}", start)?;
                if let Some(end) = end {
                    write!(f, " to {}", end)?;
                }
                Ok(())
            }
        }
    }
}

/// A parsed RillTime expression
///
/// Parsing is pure: the same string always yields the same expression, so
/// parsed values are cacheable by string. Resolution against a reference
/// context happens separately and owns no state.
#[derive(Debug, Clone, PartialEq)]
pub struct RillTime {
    pub(crate) raw: String,
    /// The interval shape
    pub interval: Interval,
    /// `as of` anchor overrides, folded left to right at resolution
    pub overrides: Vec<PointInTime>,
    /// Requested display grain (`: h`)
    pub grain: Option<Grain>,
    /// Expression-level timezone (`tz Asia/Kathmandu`)
    pub timezone: Option<Tz>,
}

impl RillTime {
    /// The expression text as written
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Finest grain the interval mentions (ignores the display grain)
    pub fn inferred_grain(&self) -> Option<Grain> {
        self.interval.grain()
    }

    /// The grain a resolved window reports: the display grain when
    /// requested, otherwise the inferred one
    pub fn effective_grain(&self) -> Option<Grain> {
        self.grain.or_else(|| self.inferred_grain())
    }

    /// See [`Interval::is_complete`]
    pub fn is_complete(&self, parent_offset: Option<&GrainDuration>) -> Supported<bool> {
        self.interval.is_complete(parent_offset)
    }
}

impl std::fmt::Display for RillTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.interval)?;
        if let Some(grain) = self.grain {
            write!(f, " : {}", grain.code())?;
        }
        for point in &self.overrides {
            write!(f, " @ {}", point)?;
        }
        if let Some(tz) = self.timezone {
            write!(f, " tz {}", tz)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for RillTime {
    type Err = crate::expr::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::expr::parse(s)
    }
}

/// A fixed instant strictly inside every grain period (mid-year,
/// mid-month, mid-week, mid-day), so snapping it to any grain moves it
fn probe_instant() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2001, 7, 18)
        .and_then(|d| d.and_hms_milli_opt(12, 31, 31, 500))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(Utc::now)
}
