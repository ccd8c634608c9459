//! Dashboard composition.
//!
//! [`compose_dashboard`] is a pure function of its inputs: no clock reads, no
//! shared state, ordered maps only. Its serialized output is therefore safe to
//! cache under [`AnalyticsRequest::cache_key`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::{aggregate, AggregateSet};
use crate::bucketer::{DateRange, Period};
use crate::cancel::CancellationToken;
use crate::context::{AnalyticsContext, PresentationConfig};
use crate::error::AnalyticsResult;
use crate::metrics::{compute_metrics, compute_series, BucketMetrics, MetricSnapshot};
use crate::ranking::{rank_dimension, RankMetric, RankingEntry, SortDirection};
use crate::records::{Dimension, SaleRecord};
use crate::request::AnalyticsRequest;
use crate::trend::{
    compute_series_trend, compute_trend, half_split_growth, BucketDelta, HalfSplitGrowth, TrendResult,
};

/// Comparison against the preceding range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub range: DateRange,
    pub snapshot: MetricSnapshot,
    pub trend: TrendResult,
    pub series: Vec<BucketDelta>,
}

/// Everything a dashboard screen shows for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub range: DateRange,
    pub period: Period,
    pub current: MetricSnapshot,
    /// Present when the request asked for a comparison.
    pub comparison: Option<Comparison>,
    pub series: Vec<BucketMetrics>,
    /// Best values of each requested dimension by revenue.
    pub top: BTreeMap<Dimension, Vec<RankingEntry>>,
    /// Trailing buckets of `series`.
    pub recent_trend: Vec<BucketMetrics>,
    pub growth: HalfSplitGrowth,
    pub skipped_records: u64,
    pub out_of_range_records: u64,
}

impl DashboardSnapshot {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            current: self.current.presented(presentation),
            comparison: self.comparison.as_ref().map(|c| Comparison {
                snapshot: c.snapshot.presented(presentation),
                trend: c.trend.presented(presentation),
                series: c.series.iter().map(|d| d.presented(presentation)).collect(),
                ..c.clone()
            }),
            series: self.series.iter().map(|b| b.presented(presentation)).collect(),
            top: self
                .top
                .iter()
                .map(|(dimension, entries)| {
                    let entries = entries
                        .iter()
                        .map(|e| e.presented(RankMetric::Revenue, presentation))
                        .collect();
                    (*dimension, entries)
                })
                .collect(),
            recent_trend: self.recent_trend.iter().map(|b| b.presented(presentation)).collect(),
            growth: self.growth.presented(presentation),
            ..self.clone()
        }
    }
}

fn build(
    records: &[SaleRecord],
    range: &DateRange,
    request: &AnalyticsRequest,
    ctx: &AnalyticsContext,
    cancel: &CancellationToken,
) -> AnalyticsResult<AggregateSet> {
    aggregate(records, range, request.period, &request.dimensions, ctx, cancel)
}

/// Builds the dashboard for `request` from already fetched records.
///
/// `previous` holds the records of `request.range.previous()` and is ignored
/// when the request does not compare. The result is rounded for output.
///
/// # Errors
///
/// Returns the request's validation errors, `RangeMismatch` under exact
/// alignment, and `Cancelled` when `cancel` fires.
pub fn compose_dashboard(
    current: &[SaleRecord],
    previous: &[SaleRecord],
    request: &AnalyticsRequest,
    ctx: &AnalyticsContext,
    cancel: &CancellationToken,
) -> AnalyticsResult<DashboardSnapshot> {
    let request = request.validate()?;

    let current_set = build(current, &request.range, &request, ctx, cancel)?;
    let snapshot = compute_metrics(&current_set);
    let series = compute_series(&current_set);

    let comparison = if request.compare_previous {
        let range = request.range.previous()?;
        let previous_set = build(previous, &range, &request, ctx, cancel)?;
        let previous_snapshot = compute_metrics(&previous_set);
        Some(Comparison {
            range,
            trend: compute_trend(&snapshot, &previous_snapshot),
            series: compute_series_trend(&current_set, &previous_set, request.alignment)?,
            snapshot: previous_snapshot,
        })
    } else {
        None
    };

    let mut top = BTreeMap::new();
    for dimension in &request.dimensions {
        let entries = rank_dimension(
            &current_set,
            *dimension,
            RankMetric::Revenue,
            SortDirection::Descending,
            request.limit,
        )?;
        top.insert(*dimension, entries);
    }

    let recent_from = series.len().saturating_sub(ctx.recent_points);
    let recent_trend = series[recent_from..].to_vec();
    cancel.check()?;

    debug!(
        range = %request.range,
        buckets = series.len(),
        compared = comparison.is_some(),
        "Dashboard composed"
    );

    let dashboard = DashboardSnapshot {
        range: request.range,
        period: request.period,
        current: snapshot,
        comparison,
        series,
        top,
        recent_trend,
        growth: half_split_growth(&current_set),
        skipped_records: current_set.skipped_records,
        out_of_range_records: current_set.out_of_range_records,
    };
    Ok(dashboard.presented(&ctx.presentation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::trend::{Alignment, TrendDirection, TrendMetric};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sale(id: i64, category: &str, price: Decimal, m: u32, d: u32) -> SaleRecord {
        SaleRecord::new(
            id,
            format!("Product {}", id % 3),
            category,
            1,
            price,
            dec!(0),
            Some(Utc.with_ymd_and_hms(2025, m, d, 13, 0, 0).unwrap()),
        )
        .with_pharmacy(format!("Pharmacy {}", id % 2), "Recife")
    }

    fn request() -> AnalyticsRequest {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
        .unwrap();
        AnalyticsRequest::new(range)
            .with_period(Period::Week)
            .with_dimensions([Dimension::Category, Dimension::Pharmacy])
            .with_limit(1)
    }

    fn current() -> Vec<SaleRecord> {
        vec![
            sale(1, "Analgesics", dec!(250.00), 3, 4),
            sale(2, "Antibiotics", dec!(750.00), 3, 20),
            sale(3, "Antibiotics", dec!(0.005), 3, 21),
        ]
    }

    #[test]
    fn composes_every_section() {
        let previous = vec![sale(10, "Analgesics", dec!(100), 2, 10)];
        let mut ctx = AnalyticsContext::utc();
        ctx.recent_points = 2;

        let dashboard =
            compose_dashboard(&current(), &previous, &request(), &ctx, &CancellationToken::none()).unwrap();

        assert_eq!(dashboard.current.record_count, 3);
        assert_eq!(dashboard.current.total_revenue, dec!(1000.01));
        assert_eq!(dashboard.top[&Dimension::Category].len(), 1);
        assert_eq!(dashboard.top[&Dimension::Category][0].key, "Antibiotics");
        assert_eq!(dashboard.recent_trend.len(), 2);
        assert_eq!(
            dashboard.recent_trend.last().map(|b| &b.label),
            dashboard.series.last().map(|b| &b.label)
        );

        let comparison = dashboard.comparison.unwrap();
        assert_eq!(comparison.range.end, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        let revenue = comparison.trend.get(TrendMetric::Revenue).unwrap();
        assert_eq!(revenue.direction, Some(TrendDirection::Increase));
    }

    #[test]
    fn comparison_is_optional() {
        let request = request().with_comparison(false, Alignment::Truncate);
        let dashboard = compose_dashboard(
            &current(),
            &[],
            &request,
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap();
        assert!(dashboard.comparison.is_none());
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let ctx = AnalyticsContext::utc();
        let first = compose_dashboard(&current(), &[], &request(), &ctx, &CancellationToken::none()).unwrap();
        let mut shuffled = current();
        shuffled.reverse();
        let second = compose_dashboard(&shuffled, &[], &request(), &ctx, &CancellationToken::none()).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_limit_before_work() {
        let err = compose_dashboard(
            &current(),
            &[],
            &request().with_limit(0),
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap_err();
        assert_eq!(err, AnalyticsError::InvalidLimit(0));
    }

    #[test]
    fn cancellation_yields_no_snapshot() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = compose_dashboard(&current(), &[], &request(), &AnalyticsContext::utc(), &cancel);
        assert!(matches!(result, Err(AnalyticsError::Cancelled(_))));
    }
}
