//! Folds sale records into per-bucket and per-dimension sums.
//!
//! Each record lands in exactly one bucket, found by binary search on bucket
//! starts. Totals and dimension slices are accumulated in the same pass, so
//! the revenue of every dimension's values in a bucket always adds up to that
//! bucket's total. Money is summed as `Decimal`.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bucketer::{DateRange, Period, TimeBucket, TimeBucketer};
use crate::cancel::CancellationToken;
use crate::context::AnalyticsContext;
use crate::error::AnalyticsResult;
use crate::records::{Dimension, SaleRecord};

/// How many records are folded between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Partial sums for one (bucket, key) cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: u64,
    pub quantity: u64,
    /// Net revenue after discounts.
    pub revenue: Decimal,
    /// Revenue before discounts.
    pub gross_revenue: Decimal,
    pub discount_amount: Decimal,
    pub last_sale: Option<DateTime<Utc>>,
}

impl Aggregate {
    fn add(&mut self, record: &SaleRecord, sold_at: DateTime<Utc>) {
        self.count += 1;
        self.quantity += u64::from(record.quantity);
        self.revenue += record.total_price;
        self.gross_revenue += record.gross_amount();
        self.discount_amount += record.discount_amount();
        self.last_sale = Some(self.last_sale.map_or(sold_at, |last| last.max(sold_at)));
    }

    /// Adds another cell's sums into this one.
    pub fn merge(&mut self, other: &Aggregate) {
        self.count += other.count;
        self.quantity += other.quantity;
        self.revenue += other.revenue;
        self.gross_revenue += other.gross_revenue;
        self.discount_amount += other.discount_amount;
        self.last_sale = match (self.last_sale, other.last_sale) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Everything one aggregation pass produces. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSet {
    pub range: DateRange,
    pub period: Period,
    pub buckets: Vec<TimeBucket>,
    /// One total per bucket, index-aligned with `buckets`.
    pub totals: Vec<Aggregate>,
    /// For each requested dimension, one map of value to sums per bucket.
    pub by_dimension: BTreeMap<Dimension, Vec<BTreeMap<String, Aggregate>>>,
    /// Scope sums per local day of the range, starting at `range.start`.
    pub daily: Vec<Aggregate>,
    /// Scope sums per local weekday, Sunday first.
    pub by_weekday: Vec<Aggregate>,
    /// Scope sums per calendar month, January first.
    pub by_month: Vec<Aggregate>,
    /// Records dropped because they carried no timestamp.
    pub skipped_records: u64,
    /// Records whose timestamp fell outside every bucket.
    pub out_of_range_records: u64,
}

impl AggregateSet {
    /// Sums across all buckets.
    #[must_use]
    pub fn scope_total(&self) -> Aggregate {
        self.totals.iter().fold(Aggregate::default(), |mut acc, cell| {
            acc.merge(cell);
            acc
        })
    }

    /// Per-value sums across all buckets, or `None` if the dimension was not requested.
    #[must_use]
    pub fn dimension_totals(&self, dimension: Dimension) -> Option<BTreeMap<String, Aggregate>> {
        let per_bucket = self.by_dimension.get(&dimension)?;
        let mut merged: BTreeMap<String, Aggregate> = BTreeMap::new();
        for cells in per_bucket {
            for (key, cell) in cells {
                merged.entry(key.clone()).or_default().merge(cell);
            }
        }
        Some(merged)
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.by_dimension.keys().copied()
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Assigns records to buckets and accumulates their sums.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    bucketer: TimeBucketer,
}

impl Aggregator {
    #[must_use]
    pub fn new(bucketer: TimeBucketer) -> Self {
        Self { bucketer }
    }

    /// Aggregates `records` over `range`.
    ///
    /// Record order does not matter. Records without a timestamp and records
    /// outside the range are counted, not aggregated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if bucketing fails and `Cancelled` if `cancel`
    /// fires; partial sums are discarded in both cases.
    pub fn aggregate<'a, I>(
        &self,
        records: I,
        range: &DateRange,
        period: Period,
        dimensions: &[Dimension],
        cancel: &CancellationToken,
    ) -> AnalyticsResult<AggregateSet>
    where
        I: IntoIterator<Item = &'a SaleRecord>,
    {
        cancel.check()?;

        let tz = self.bucketer.timezone();
        let buckets = self.bucketer.buckets(range, period)?;
        let mut totals = vec![Aggregate::default(); buckets.len()];
        let mut by_dimension: BTreeMap<Dimension, Vec<BTreeMap<String, Aggregate>>> = dimensions
            .iter()
            .map(|dimension| (*dimension, vec![BTreeMap::new(); buckets.len()]))
            .collect();
        let mut daily = vec![Aggregate::default(); usize::try_from(range.days()).unwrap_or(0)];
        let mut by_weekday = vec![Aggregate::default(); 7];
        let mut by_month = vec![Aggregate::default(); 12];
        let mut skipped_records = 0u64;
        let mut out_of_range_records = 0u64;
        let mut seen = 0usize;

        for record in records {
            seen += 1;
            if seen % CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }

            let Some(sold_at) = record.sold_at else {
                skipped_records += 1;
                continue;
            };
            let Some(idx) = TimeBucketer::locate(&buckets, sold_at) else {
                out_of_range_records += 1;
                continue;
            };

            totals[idx].add(record, sold_at);
            for (dimension, cells) in &mut by_dimension {
                cells[idx]
                    .entry(dimension.key_of(record).to_string())
                    .or_default()
                    .add(record, sold_at);
            }

            let local = sold_at.with_timezone(&tz);
            let offset = (local.date_naive() - range.start).num_days();
            if let Some(cell) = usize::try_from(offset).ok().and_then(|i| daily.get_mut(i)) {
                cell.add(record, sold_at);
            }
            by_weekday[local.weekday().num_days_from_sunday() as usize].add(record, sold_at);
            by_month[local.month0() as usize].add(record, sold_at);
        }

        cancel.check()?;

        if skipped_records > 0 {
            warn!(skipped_records, "Records without a timestamp were excluded");
        }
        if out_of_range_records > 0 {
            warn!(
                out_of_range_records,
                range = %range,
                "Records outside the requested range were excluded"
            );
        }
        debug!(
            records = seen,
            buckets = buckets.len(),
            period = %period,
            dimensions = dimensions.len(),
            "Aggregation complete"
        );

        Ok(AggregateSet {
            range: *range,
            period,
            buckets,
            totals,
            by_dimension,
            daily,
            by_weekday,
            by_month,
            skipped_records,
            out_of_range_records,
        })
    }
}

/// Aggregates `records` using the context's reference timezone.
///
/// # Errors
///
/// See [`Aggregator::aggregate`].
pub fn aggregate<'a, I>(
    records: I,
    range: &DateRange,
    period: Period,
    dimensions: &[Dimension],
    ctx: &AnalyticsContext,
    cancel: &CancellationToken,
) -> AnalyticsResult<AggregateSet>
where
    I: IntoIterator<Item = &'a SaleRecord>,
{
    Aggregator::new(ctx.bucketer()).aggregate(records, range, period, dimensions, cancel)
}
