//! Calendar bucketing of date ranges.
//!
//! A requested `[start, end]` date range is split into contiguous buckets whose
//! boundaries are local midnights in the reference timezone. Month, quarter,
//! and year buckets snap to calendar boundaries, but the first and last bucket
//! are clipped to the requested range while keeping the full calendar label.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// First day of the calendar period containing `date`. Weeks start on Monday.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the date cannot be represented.
    pub fn floor(&self, date: NaiveDate) -> AnalyticsResult<NaiveDate> {
        let floored = match self {
            Self::Day => Some(date),
            Self::Week => {
                date.checked_sub_signed(Duration::days(i64::from(date.weekday().num_days_from_monday())))
            }
            Self::Month => date.with_day(1),
            Self::Quarter => NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1),
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        floored.ok_or_else(|| out_of_range(date))
    }

    /// First day of the calendar period following the one starting at `period_start`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the date cannot be represented.
    pub fn next_start(&self, period_start: NaiveDate) -> AnalyticsResult<NaiveDate> {
        let next = match self {
            Self::Day => period_start.succ_opt(),
            Self::Week => period_start.checked_add_signed(Duration::days(7)),
            Self::Month => period_start.checked_add_months(Months::new(1)),
            Self::Quarter => period_start.checked_add_months(Months::new(3)),
            Self::Year => period_start.checked_add_months(Months::new(12)),
        };
        next.ok_or_else(|| out_of_range(period_start))
    }

    /// Display label of the full calendar period starting at `period_start`.
    #[must_use]
    pub fn label(&self, period_start: NaiveDate) -> String {
        match self {
            Self::Day => period_start.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let iso = period_start.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            Self::Month => period_start.format("%Y-%m").to_string(),
            Self::Quarter => format!("{}-Q{}", period_start.year(), period_start.month0() / 3 + 1),
            Self::Year => period_start.year().to_string(),
        }
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "quarter" | "quarterly" => Ok(Self::Quarter),
            "year" | "yearly" | "annual" => Ok(Self::Year),
            other => Err(AnalyticsError::InvalidRange(format!(
                "unrecognized period '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn out_of_range(date: NaiveDate) -> AnalyticsError {
    AnalyticsError::InvalidRange(format!("date {date} is outside the supported calendar"))
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns `InvalidRange` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> AnalyticsResult<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses two `YYYY-MM-DD` dates.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for malformed dates or `start > end`.
    pub fn parse(start: &str, end: &str) -> AnalyticsResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| AnalyticsError::InvalidRange(format!("invalid date '{s}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// The `days` days ending on `end`, inclusive.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` when `days < 1`.
    pub fn trailing(end: NaiveDate, days: i64) -> AnalyticsResult<Self> {
        if days < 1 {
            return Err(AnalyticsError::InvalidRange(format!(
                "lookback of {days} days is not positive"
            )));
        }
        let start = end
            .checked_sub_signed(Duration::days(days - 1))
            .ok_or_else(|| out_of_range(end))?;
        Self::new(start, end)
    }

    /// Number of days covered, always at least 1.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The range of equal length ending the day before this one starts.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the previous range leaves the calendar.
    pub fn previous(&self) -> AnalyticsResult<Self> {
        let end = self.start.pred_opt().ok_or_else(|| out_of_range(self.start))?;
        Self::trailing(end, self.days())
    }

    /// UTC instants `[start, end)` covering the range in `tz`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the day after `end` cannot be represented.
    pub fn bounds(&self, tz: &Tz) -> AnalyticsResult<(DateTime<Utc>, DateTime<Utc>)> {
        let after = self.end.succ_opt().ok_or_else(|| out_of_range(self.end))?;
        Ok((local_midnight(tz, self.start), local_midnight(tz, after)))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Start of `date` in `tz`, as a UTC instant.
///
/// Ambiguous midnights resolve to the earliest instant. Midnights skipped by a
/// DST transition resolve to the first wall-clock time that exists.
#[must_use]
pub fn local_midnight(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN))
}

/// Wall-clock `local` in `tz`, as a UTC instant.
///
/// Ambiguous times take the earliest instant; times inside a DST gap move
/// forward to the end of the gap.
#[must_use]
pub fn resolve_local(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // transitions fall on quarter hours
            let quarter = local.minute() - local.minute() % 15;
            let mut candidate = local
                .date()
                .and_hms_opt(local.hour(), quarter, 0)
                .unwrap_or(local);
            for _ in 0..(24 * 4) {
                candidate += Duration::minutes(15);
                if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                    return dt.with_timezone(&Utc);
                }
            }
            Utc.from_utc_datetime(&local)
        }
    }
}

/// A half-open interval of time covering one (possibly clipped) calendar period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub period: Period,
    /// Inclusive start instant.
    pub start: DateTime<Utc>,
    /// Exclusive end instant.
    pub end: DateTime<Utc>,
    /// Label of the full calendar period, even when clipped.
    pub label: String,
    pub calendar_start: NaiveDate,
    /// First local day inside the bucket.
    pub first_day: NaiveDate,
    /// Last local day inside the bucket.
    pub last_day: NaiveDate,
}

impl TimeBucket {
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Returns true when the bucket covers less than its calendar period.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.first_day != self.calendar_start
            || self
                .period
                .next_start(self.calendar_start)
                .map(|next| self.last_day.succ_opt() != Some(next))
                .unwrap_or(true)
    }
}

/// Splits date ranges into buckets in a fixed reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct TimeBucketer {
    tz: Tz,
}

impl TimeBucketer {
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Produces the ordered, contiguous buckets covering `range`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if a boundary leaves the supported calendar.
    pub fn buckets(&self, range: &DateRange, period: Period) -> AnalyticsResult<Vec<TimeBucket>> {
        let after_end = range.end.succ_opt().ok_or_else(|| out_of_range(range.end))?;
        let mut buckets = Vec::new();
        let mut day = range.start;

        while day < after_end {
            let calendar_start = period.floor(day)?;
            let next = period.next_start(calendar_start)?.min(after_end);
            let last_day = next.pred_opt().ok_or_else(|| out_of_range(next))?;

            buckets.push(TimeBucket {
                period,
                start: local_midnight(&self.tz, day),
                end: local_midnight(&self.tz, next),
                label: period.label(calendar_start),
                calendar_start,
                first_day: day,
                last_day,
            });
            day = next;
        }

        Ok(buckets)
    }

    /// Validates raw dates and a period name, then buckets them.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` when `start > end` or the period is unrecognized.
    pub fn split(&self, start: NaiveDate, end: NaiveDate, period: &str) -> AnalyticsResult<Vec<TimeBucket>> {
        let period: Period = period.parse()?;
        self.buckets(&DateRange::new(start, end)?, period)
    }

    /// Index of the bucket containing `instant`, if any. `buckets` must be ordered.
    #[must_use]
    pub fn locate(buckets: &[TimeBucket], instant: DateTime<Utc>) -> Option<usize> {
        let idx = buckets.partition_point(|b| b.start <= instant).checked_sub(1)?;
        buckets[idx].contains(instant).then_some(idx)
    }
}
