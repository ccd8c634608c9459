//! Trend CLI command.
//!
//! Compares the requested range with the preceding range of equal length,
//! bucket by bucket, and reports growth between the two halves of the range.

use anyhow::Result;
use clap::Args;
use pharma_analytics_core::{
    compute_metrics, compute_series_trend, compute_trend, half_split_growth, Alignment, BucketDelta,
    HalfSplitGrowth, MetricsFormatter, TrendResult,
};
use serde::Serialize;

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Arguments for the trend command.
#[derive(Args, Debug, Clone)]
pub struct TrendArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Pair series buckets only when both ranges have the same count
    #[arg(long)]
    pub exact: bool,
}

#[derive(Debug, Serialize)]
struct TrendReport {
    trend: TrendResult,
    series: Vec<BucketDelta>,
    growth: HalfSplitGrowth,
}

/// Runs the trend command.
///
/// # Errors
/// Returns an error if the query is invalid, the series cannot be aligned,
/// the data cannot be loaded, or the computation is cancelled.
pub async fn run_trend(global: &GlobalArgs, args: TrendArgs) -> Result<()> {
    let session = Session::open(global, &args.query)?;
    let presentation = &session.ctx().presentation;
    let alignment = if args.exact { Alignment::Exact } else { Alignment::Truncate };

    let previous_range = session.request.range.previous()?;
    let current = session.aggregate(&session.request, None).await?;
    let previous = session.aggregate(&session.request, Some(&previous_range)).await?;

    let report = TrendReport {
        trend: compute_trend(&compute_metrics(&current), &compute_metrics(&previous)).presented(presentation),
        series: compute_series_trend(&current, &previous, alignment)?
            .iter()
            .map(|delta| delta.presented(presentation))
            .collect(),
        growth: half_split_growth(&current).presented(presentation),
    };

    emit(session.format, &report, |report| MetricsFormatter::trend(&report.trend))
}
