//! Period-over-period comparison.
//!
//! Direction comes from the sign of the absolute delta, so a move from zero
//! to a positive value is an increase with an undefined percentage.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregate, AggregateSet};
use crate::context::PresentationConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::metrics::{percentage, round, MetricSnapshot};

/// How two bucket series are paired when their lengths differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Bucket counts must match.
    Exact,
    /// Pair buckets up to the shorter series.
    #[default]
    Truncate,
}

impl Alignment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Truncate => "truncate",
        }
    }
}

impl FromStr for Alignment {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "truncate" | "loose" => Ok(Self::Truncate),
            other => Err(AnalyticsError::InvalidRange(format!(
                "unrecognized alignment '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increase,
    Decrease,
    Unchanged,
}

impl TrendDirection {
    #[must_use]
    pub fn from_delta(delta: Decimal) -> Self {
        if delta.is_sign_positive() && !delta.is_zero() {
            Self::Increase
        } else if delta.is_sign_negative() && !delta.is_zero() {
            Self::Decrease
        } else {
            Self::Unchanged
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increase => write!(f, "increase"),
            Self::Decrease => write!(f, "decrease"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Revenue,
    Quantity,
    RecordCount,
    AverageTicket,
}

impl TrendMetric {
    fn is_money(self) -> bool {
        matches!(self, Self::Revenue | Self::AverageTicket)
    }
}

/// Change of one metric between two periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: TrendMetric,
    pub current: Option<Decimal>,
    pub previous: Option<Decimal>,
    /// `current - previous`; `None` if either side is undefined.
    pub delta: Option<Decimal>,
    /// `delta / previous * 100`; `None` when previous is zero or undefined.
    pub percent_delta: Option<Decimal>,
    pub direction: Option<TrendDirection>,
}

impl MetricDelta {
    #[must_use]
    pub fn between(metric: TrendMetric, current: Option<Decimal>, previous: Option<Decimal>) -> Self {
        let delta = current.zip(previous).map(|(c, p)| c - p);
        let percent_delta = delta.zip(previous).and_then(|(d, p)| percentage(d, p));

        Self {
            metric,
            current,
            previous,
            delta,
            percent_delta,
            direction: delta.map(TrendDirection::from_delta),
        }
    }

    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        let places = if self.metric.is_money() {
            presentation.currency_decimal_places
        } else {
            0
        };
        let value = |v: Option<Decimal>| v.map(|v| round(v, places));

        Self {
            current: value(self.current),
            previous: value(self.previous),
            delta: value(self.delta),
            percent_delta: self
                .percent_delta
                .map(|p| round(p, presentation.percentage_decimal_places)),
            ..self.clone()
        }
    }
}

/// Comparison of two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendResult {
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,
    pub previous_start: NaiveDate,
    pub previous_end: NaiveDate,
    pub metrics: Vec<MetricDelta>,
}

impl TrendResult {
    #[must_use]
    pub fn get(&self, metric: TrendMetric) -> Option<&MetricDelta> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            metrics: self.metrics.iter().map(|m| m.presented(presentation)).collect(),
            ..self.clone()
        }
    }
}

/// Compares revenue, quantity, record count, and average ticket.
///
/// The caller supplies an equal-length previous range; see
/// [`crate::bucketer::DateRange::previous`].
#[must_use]
pub fn compute_trend(current: &MetricSnapshot, previous: &MetricSnapshot) -> TrendResult {
    let count = |v: u64| Some(Decimal::from(v));

    TrendResult {
        current_start: current.period_start,
        current_end: current.period_end,
        previous_start: previous.period_start,
        previous_end: previous.period_end,
        metrics: vec![
            MetricDelta::between(
                TrendMetric::Revenue,
                Some(current.total_revenue),
                Some(previous.total_revenue),
            ),
            MetricDelta::between(
                TrendMetric::Quantity,
                count(current.total_quantity),
                count(previous.total_quantity),
            ),
            MetricDelta::between(
                TrendMetric::RecordCount,
                count(current.record_count),
                count(previous.record_count),
            ),
            MetricDelta::between(
                TrendMetric::AverageTicket,
                current.average_ticket,
                previous.average_ticket,
            ),
        ],
    }
}

/// Revenue change between paired buckets of two series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDelta {
    pub current_label: String,
    pub previous_label: String,
    pub revenue: MetricDelta,
}

impl BucketDelta {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            revenue: self.revenue.presented(presentation),
            ..self.clone()
        }
    }
}

/// Pairs buckets of `current` and `previous` by position.
///
/// # Errors
///
/// Returns `RangeMismatch` under `Alignment::Exact` when bucket counts differ.
pub fn compute_series_trend(
    current: &AggregateSet,
    previous: &AggregateSet,
    alignment: Alignment,
) -> AnalyticsResult<Vec<BucketDelta>> {
    if alignment == Alignment::Exact && current.bucket_count() != previous.bucket_count() {
        return Err(AnalyticsError::RangeMismatch {
            current: current.bucket_count(),
            previous: previous.bucket_count(),
        });
    }

    Ok(current
        .buckets
        .iter()
        .zip(&current.totals)
        .zip(previous.buckets.iter().zip(&previous.totals))
        .map(|((cur_bucket, cur), (prev_bucket, prev))| BucketDelta {
            current_label: cur_bucket.label.clone(),
            previous_label: prev_bucket.label.clone(),
            revenue: MetricDelta::between(
                TrendMetric::Revenue,
                Some(cur.revenue),
                Some(prev.revenue),
            ),
        })
        .collect())
}

/// Revenue of the second half of a range compared with the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfSplitGrowth {
    /// First day of the second half.
    pub split_day: NaiveDate,
    pub first_half_revenue: Decimal,
    pub second_half_revenue: Decimal,
    /// `None` when the first half had no revenue.
    pub growth_rate_pct: Option<Decimal>,
}

impl HalfSplitGrowth {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            first_half_revenue: round(self.first_half_revenue, presentation.currency_decimal_places),
            second_half_revenue: round(self.second_half_revenue, presentation.currency_decimal_places),
            growth_rate_pct: self
                .growth_rate_pct
                .map(|g| round(g, presentation.percentage_decimal_places)),
            ..self.clone()
        }
    }
}

/// Splits the range at its middle day; the second half gets the extra day
/// of an odd-length range.
///
/// The first half is `days / 2` days long, so a 10-day range splits 5 + 5
/// and a 9-day range 4 + 5. Splitting at `start + (end - start) / 2`
/// instead would give 4 + 6 for 10 days; that split is not used.
#[must_use]
pub fn half_split_growth(set: &AggregateSet) -> HalfSplitGrowth {
    let mid = set.daily.len() / 2;
    let sum = |cells: &[Aggregate]| cells.iter().map(|c| c.revenue).sum::<Decimal>();
    let first_half_revenue = sum(&set.daily[..mid]);
    let second_half_revenue = sum(&set.daily[mid..]);
    let split_day = set
        .range
        .start
        .checked_add_signed(Duration::days(i64::try_from(mid).unwrap_or(i64::MAX)))
        .unwrap_or(set.range.end);

    HalfSplitGrowth {
        split_day,
        first_half_revenue,
        second_half_revenue,
        growth_rate_pct: percentage(second_half_revenue - first_half_revenue, first_half_revenue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::bucketer::{DateRange, Period};
    use crate::cancel::CancellationToken;
    use crate::context::AnalyticsContext;
    use crate::metrics::compute_metrics;
    use crate::records::SaleRecord;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(id: i64, price: Decimal, y: i32, m: u32, d: u32) -> SaleRecord {
        SaleRecord::new(
            id,
            "Dipirona",
            "Analgesics",
            1,
            price,
            dec!(0),
            Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
        )
    }

    fn build(records: &[SaleRecord], range: DateRange, period: Period) -> AggregateSet {
        aggregate(
            records,
            &range,
            period,
            &[],
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap()
    }

    #[test]
    fn growth_from_zero_is_increase_without_percent() {
        let delta = MetricDelta::between(TrendMetric::Revenue, Some(dec!(500)), Some(dec!(0)));
        assert_eq!(delta.delta, Some(dec!(500)));
        assert_eq!(delta.percent_delta, None);
        assert_eq!(delta.direction, Some(TrendDirection::Increase));
    }

    #[test]
    fn decline_and_flat_directions() {
        let down = MetricDelta::between(TrendMetric::Revenue, Some(dec!(75)), Some(dec!(100)));
        assert_eq!(down.delta, Some(dec!(-25)));
        assert_eq!(down.percent_delta, Some(dec!(-25)));
        assert_eq!(down.direction, Some(TrendDirection::Decrease));

        let flat = MetricDelta::between(TrendMetric::Quantity, Some(dec!(0)), Some(dec!(0)));
        assert_eq!(flat.delta, Some(Decimal::ZERO));
        assert_eq!(flat.percent_delta, None);
        assert_eq!(flat.direction, Some(TrendDirection::Unchanged));
    }

    #[test]
    fn undefined_side_makes_everything_undefined() {
        let delta = MetricDelta::between(TrendMetric::AverageTicket, Some(dec!(20)), None);
        assert_eq!(delta.delta, None);
        assert_eq!(delta.percent_delta, None);
        assert_eq!(delta.direction, None);
    }

    #[test]
    fn snapshot_trend_compares_all_metrics() {
        let current_range = DateRange::new(date(2025, 2, 1), date(2025, 2, 28)).unwrap();
        let previous_range = current_range.previous().unwrap();
        let current = compute_metrics(&build(
            &[sale(1, dec!(300), 2025, 2, 3), sale(2, dec!(200), 2025, 2, 20)],
            current_range,
            Period::Month,
        ));
        let previous = compute_metrics(&build(&[], previous_range, Period::Month));

        let trend = compute_trend(&current, &previous);
        let revenue = trend.get(TrendMetric::Revenue).unwrap();
        assert_eq!(revenue.delta, Some(dec!(500)));
        assert_eq!(revenue.percent_delta, None);
        assert_eq!(revenue.direction, Some(TrendDirection::Increase));

        let count = trend.get(TrendMetric::RecordCount).unwrap();
        assert_eq!(count.delta, Some(dec!(2)));

        let ticket = trend.get(TrendMetric::AverageTicket).unwrap();
        assert_eq!(ticket.current, Some(dec!(250)));
        assert_eq!(ticket.previous, None);
        assert_eq!(ticket.direction, None);
        assert_eq!(trend.previous_end, date(2025, 1, 31));
    }

    #[test]
    fn series_trend_requires_equal_buckets_when_exact() {
        let current = build(&[], DateRange::new(date(2025, 3, 1), date(2025, 3, 31)).unwrap(), Period::Week);
        let previous = build(&[], DateRange::new(date(2025, 2, 1), date(2025, 2, 28)).unwrap(), Period::Week);
        assert_ne!(current.bucket_count(), previous.bucket_count());

        let err = compute_series_trend(&current, &previous, Alignment::Exact).unwrap_err();
        assert!(matches!(err, AnalyticsError::RangeMismatch { .. }));

        let pairs = compute_series_trend(&current, &previous, Alignment::Truncate).unwrap();
        assert_eq!(pairs.len(), current.bucket_count().min(previous.bucket_count()));
    }

    #[test]
    fn series_trend_pairs_by_position() {
        let current = build(
            &[sale(1, dec!(40), 2025, 1, 8)],
            DateRange::new(date(2025, 1, 8), date(2025, 1, 9)).unwrap(),
            Period::Day,
        );
        let previous = build(
            &[sale(2, dec!(10), 2025, 1, 6), sale(3, dec!(10), 2025, 1, 7)],
            DateRange::new(date(2025, 1, 6), date(2025, 1, 7)).unwrap(),
            Period::Day,
        );
        let pairs = compute_series_trend(&current, &previous, Alignment::Exact).unwrap();
        assert_eq!(pairs[0].current_label, "2025-01-08");
        assert_eq!(pairs[0].previous_label, "2025-01-06");
        assert_eq!(pairs[0].revenue.percent_delta, Some(dec!(300)));
        assert_eq!(pairs[1].revenue.direction, Some(TrendDirection::Decrease));
    }

    #[test]
    fn half_split_growth_uses_daily_totals() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 10)).unwrap();
        let set = build(
            &[sale(1, dec!(100), 2025, 1, 2), sale(2, dec!(150), 2025, 1, 9)],
            range,
            Period::Month,
        );
        let growth = half_split_growth(&set);
        assert_eq!(growth.split_day, date(2025, 1, 6));
        assert_eq!(growth.first_half_revenue, dec!(100));
        assert_eq!(growth.second_half_revenue, dec!(150));
        assert_eq!(growth.growth_rate_pct, Some(dec!(50)));

        let empty = half_split_growth(&build(&[], range, Period::Month));
        assert_eq!(empty.growth_rate_pct, None);
    }

    #[test]
    fn half_split_gives_equal_halves_and_odd_day_to_the_second() {
        // day five belongs to the first half of a ten-day range
        let ten_days = DateRange::new(date(2025, 1, 1), date(2025, 1, 10)).unwrap();
        let growth = half_split_growth(&build(&[sale(1, dec!(40), 2025, 1, 5)], ten_days, Period::Day));
        assert_eq!(growth.split_day, date(2025, 1, 6));
        assert_eq!(growth.first_half_revenue, dec!(40));
        assert_eq!(growth.second_half_revenue, Decimal::ZERO);

        let nine_days = DateRange::new(date(2025, 1, 1), date(2025, 1, 9)).unwrap();
        let growth = half_split_growth(&build(&[sale(1, dec!(40), 2025, 1, 5)], nine_days, Period::Day));
        assert_eq!(growth.split_day, date(2025, 1, 5));
        assert_eq!(growth.second_half_revenue, dec!(40));
    }

    #[test]
    fn parses_alignment() {
        assert_eq!("EXACT".parse::<Alignment>().unwrap(), Alignment::Exact);
        assert_eq!("truncate".parse::<Alignment>().unwrap(), Alignment::Truncate);
        assert!("fuzzy".parse::<Alignment>().is_err());
    }
}
