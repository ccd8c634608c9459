//! KPIs derived from aggregates.
//!
//! Ratios with a zero denominator are `None`, never zero: an average ticket of
//! zero and "no sales" are different answers. Values keep full precision until
//! [`MetricSnapshot::presented`] (and friends) round them for output.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregate, AggregateSet};
use crate::context::PresentationConfig;
use crate::records::Dimension;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Scope-level KPIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_revenue: Decimal,
    pub total_quantity: u64,
    pub record_count: u64,
    /// `None` when there are no sales.
    pub average_ticket: Option<Decimal>,
    pub gross_revenue: Decimal,
    pub discount_total: Decimal,
    /// Discount as a percentage of gross revenue; `None` when gross is zero.
    pub discount_rate: Option<Decimal>,
    /// Share of total revenue per dimension value, in percent. Every share is
    /// `None` when total revenue is zero.
    pub market_share: BTreeMap<Dimension, BTreeMap<String, Option<Decimal>>>,
    /// Number of distinct values seen per aggregated dimension.
    pub distinct_values: BTreeMap<Dimension, usize>,
    pub skipped_records: u64,
}

impl MetricSnapshot {
    /// Copy rounded for output. Counts are untouched.
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        let money = |v: Decimal| round(v, presentation.currency_decimal_places);
        let pct = |v: Option<Decimal>| v.map(|v| round(v, presentation.percentage_decimal_places));

        Self {
            total_revenue: money(self.total_revenue),
            average_ticket: self.average_ticket.map(money),
            gross_revenue: money(self.gross_revenue),
            discount_total: money(self.discount_total),
            discount_rate: pct(self.discount_rate),
            market_share: self
                .market_share
                .iter()
                .map(|(dimension, shares)| {
                    let shares = shares.iter().map(|(k, v)| (k.clone(), pct(*v))).collect();
                    (*dimension, shares)
                })
                .collect(),
            ..self.clone()
        }
    }
}

/// One point of a revenue time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub revenue: Decimal,
    pub quantity: u64,
    pub record_count: u64,
    pub average_ticket: Option<Decimal>,
    pub gross_revenue: Decimal,
    pub discount_rate: Option<Decimal>,
}

impl BucketMetrics {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            revenue: round(self.revenue, presentation.currency_decimal_places),
            average_ticket: self
                .average_ticket
                .map(|v| round(v, presentation.currency_decimal_places)),
            gross_revenue: round(self.gross_revenue, presentation.currency_decimal_places),
            discount_rate: self
                .discount_rate
                .map(|v| round(v, presentation.percentage_decimal_places)),
            ..self.clone()
        }
    }
}

/// Scope totals for one dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub key: String,
    pub revenue: Decimal,
    pub quantity: u64,
    pub record_count: u64,
    pub average_ticket: Option<Decimal>,
    pub share: Option<Decimal>,
    pub last_sale: Option<DateTime<Utc>>,
}

impl SegmentMetrics {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        Self {
            revenue: round(self.revenue, presentation.currency_decimal_places),
            average_ticket: self
                .average_ticket
                .map(|v| round(v, presentation.currency_decimal_places)),
            share: self
                .share
                .map(|v| round(v, presentation.percentage_decimal_places)),
            ..self.clone()
        }
    }
}

/// Rounds half away from zero.
#[must_use]
pub fn round(value: Decimal, decimal_places: u32) -> Decimal {
    value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

/// `revenue / count`, or `None` without sales.
#[must_use]
pub fn average_ticket(revenue: Decimal, count: u64) -> Option<Decimal> {
    (count > 0).then(|| revenue / Decimal::from(count))
}

/// `part / whole * 100`, or `None` when `whole` is zero.
#[must_use]
pub fn percentage(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        None
    } else {
        Some(part / whole * HUNDRED)
    }
}

/// Share of `total_revenue` held by each value.
#[must_use]
pub fn market_share(
    cells: &BTreeMap<String, Aggregate>,
    total_revenue: Decimal,
) -> BTreeMap<String, Option<Decimal>> {
    cells
        .iter()
        .map(|(key, cell)| (key.clone(), percentage(cell.revenue, total_revenue)))
        .collect()
}

/// Scope KPIs for an aggregate set.
#[must_use]
pub fn compute_metrics(set: &AggregateSet) -> MetricSnapshot {
    let total = set.scope_total();
    let mut market = BTreeMap::new();
    let mut distinct_values = BTreeMap::new();

    for dimension in set.dimensions() {
        if let Some(cells) = set.dimension_totals(dimension) {
            distinct_values.insert(dimension, cells.len());
            market.insert(dimension, market_share(&cells, total.revenue));
        }
    }

    MetricSnapshot {
        period_start: set.range.start,
        period_end: set.range.end,
        total_revenue: total.revenue,
        total_quantity: total.quantity,
        record_count: total.count,
        average_ticket: average_ticket(total.revenue, total.count),
        gross_revenue: total.gross_revenue,
        discount_total: total.discount_amount,
        discount_rate: percentage(total.discount_amount, total.gross_revenue),
        market_share: market,
        distinct_values,
        skipped_records: set.skipped_records,
    }
}

/// One row per bucket, zero-filled, in bucket order.
#[must_use]
pub fn compute_series(set: &AggregateSet) -> Vec<BucketMetrics> {
    set.buckets
        .iter()
        .zip(&set.totals)
        .map(|(bucket, cell)| BucketMetrics {
            label: bucket.label.clone(),
            start: bucket.start,
            end: bucket.end,
            first_day: bucket.first_day,
            last_day: bucket.last_day,
            revenue: cell.revenue,
            quantity: cell.quantity,
            record_count: cell.count,
            average_ticket: average_ticket(cell.revenue, cell.count),
            gross_revenue: cell.gross_revenue,
            discount_rate: percentage(cell.discount_amount, cell.gross_revenue),
        })
        .collect()
}

/// Per-value totals for `dimension`, highest revenue first, ties by key.
///
/// Empty when the dimension was not aggregated.
#[must_use]
pub fn dimension_breakdown(set: &AggregateSet, dimension: Dimension) -> Vec<SegmentMetrics> {
    let Some(cells) = set.dimension_totals(dimension) else {
        return Vec::new();
    };
    let total_revenue = set.scope_total().revenue;

    let mut segments: Vec<SegmentMetrics> = cells
        .into_iter()
        .map(|(key, cell)| SegmentMetrics {
            average_ticket: average_ticket(cell.revenue, cell.count),
            share: percentage(cell.revenue, total_revenue),
            key,
            revenue: cell.revenue,
            quantity: cell.quantity,
            record_count: cell.count,
            last_sale: cell.last_sale,
        })
        .collect();
    segments.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::bucketer::{DateRange, Period};
    use crate::cancel::CancellationToken;
    use crate::context::AnalyticsContext;
    use crate::records::SaleRecord;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn day() -> DateRange {
        let d = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        DateRange::new(d, d).unwrap()
    }

    fn build(records: &[SaleRecord], dimensions: &[Dimension]) -> AggregateSet {
        aggregate(
            records,
            &day(),
            Period::Day,
            dimensions,
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap()
    }

    fn sale(id: i64, category: &str, price: Decimal) -> SaleRecord {
        SaleRecord::new(
            id,
            format!("Product {id}"),
            category,
            1,
            price,
            dec!(0),
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap()),
        )
    }

    #[test]
    fn market_share_of_two_categories() {
        let set = build(
            &[sale(1, "Analgesics", dec!(250.00)), sale(2, "Antibiotics", dec!(750.00))],
            &[Dimension::Category],
        );
        let snapshot = compute_metrics(&set);

        assert_eq!(snapshot.total_revenue, dec!(1000.00));
        let shares = &snapshot.market_share[&Dimension::Category];
        assert_eq!(shares["Analgesics"], Some(dec!(25)));
        assert_eq!(shares["Antibiotics"], Some(dec!(75)));
        assert_eq!(snapshot.average_ticket, Some(dec!(500)));
        assert_eq!(snapshot.distinct_values[&Dimension::Category], 2);
    }

    #[test]
    fn empty_scope_has_undefined_ratios() {
        let snapshot = compute_metrics(&build(&[], &[Dimension::Category]));
        assert_eq!(snapshot.total_revenue, Decimal::ZERO);
        assert_eq!(snapshot.record_count, 0);
        assert_eq!(snapshot.total_quantity, 0);
        assert_eq!(snapshot.average_ticket, None);
        assert_eq!(snapshot.discount_rate, None);
        assert!(snapshot.market_share[&Dimension::Category].is_empty());
    }

    #[test]
    fn zero_revenue_makes_every_share_undefined() {
        let set = build(
            &[sale(1, "Samples", dec!(0)), sale(2, "Vaccines", dec!(0))],
            &[Dimension::Category],
        );
        let snapshot = compute_metrics(&set);
        assert_eq!(snapshot.record_count, 2);
        assert_eq!(snapshot.average_ticket, Some(Decimal::ZERO));
        assert!(snapshot.market_share[&Dimension::Category]
            .values()
            .all(Option::is_none));
    }

    #[test]
    fn presentation_rounds_only_on_output() {
        let set = build(
            &[
                sale(1, "A", dec!(1.00)),
                sale(2, "B", dec!(1.00)),
                sale(3, "C", dec!(1.00)),
            ],
            &[Dimension::Category],
        );
        let snapshot = compute_metrics(&set);
        let raw = snapshot.market_share[&Dimension::Category]["A"].unwrap();
        assert!(raw > dec!(33.333333));
        assert_ne!(raw, dec!(33.33));

        let presented = snapshot.presented(&PresentationConfig::default());
        assert_eq!(presented.market_share[&Dimension::Category]["A"], Some(dec!(33.33)));
        assert_eq!(presented.average_ticket, Some(dec!(1.00)));
        assert_eq!(presented.record_count, 3);
    }

    #[test]
    fn discount_rate_relative_to_gross() {
        let record = SaleRecord::new(
            1,
            "Losartana",
            "Cardiovascular",
            10,
            dec!(8.00),
            dec!(0.05),
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()),
        );
        let snapshot = compute_metrics(&build(&[record], &[]));
        assert_eq!(snapshot.gross_revenue, dec!(80.00));
        assert_eq!(snapshot.total_revenue, dec!(76.00));
        assert_eq!(snapshot.discount_rate, Some(dec!(5)));
    }

    #[test]
    fn series_is_zero_filled() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
        )
        .unwrap();
        let set = aggregate(
            &[sale(1, "A", dec!(5))],
            &range,
            Period::Day,
            &[],
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap();
        let series = compute_series(&set);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].revenue, Decimal::ZERO);
        assert_eq!(series[0].average_ticket, None);
        assert_eq!(series[1].revenue, dec!(5));
        assert_eq!(series[2].label, "2025-03-11");
    }

    #[test]
    fn breakdown_orders_by_revenue_then_key() {
        let set = build(
            &[
                sale(1, "Beta", dec!(10)),
                sale(2, "Alpha", dec!(10)),
                sale(3, "Gamma", dec!(30)),
            ],
            &[Dimension::Category],
        );
        let keys: Vec<_> = dimension_breakdown(&set, Dimension::Category)
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, ["Gamma", "Alpha", "Beta"]);
        assert!(dimension_breakdown(&set, Dimension::Pharmacy).is_empty());
    }
}
