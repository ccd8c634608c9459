//! Performance CLI command: scope KPIs and the revenue series.

use anyhow::Result;
use pharma_analytics_core::{compute_metrics, compute_series, BucketMetrics, Dimension, MetricSnapshot, MetricsFormatter};
use serde::Serialize;

use super::{emit, GlobalArgs, QueryArgs, Session};

#[derive(Debug, Serialize)]
struct PerformanceReport {
    summary: MetricSnapshot,
    series: Vec<BucketMetrics>,
}

/// Runs the performance command.
///
/// # Errors
/// Returns an error if the query is invalid, the data cannot be loaded, or
/// the computation is cancelled.
pub async fn run_performance(global: &GlobalArgs, args: QueryArgs) -> Result<()> {
    let session = Session::open(global, &args)?;
    let presentation = &session.ctx().presentation;

    // distinct product and pharmacy counts come from these slices
    let mut dimensions = session.request.dimensions.clone();
    dimensions.extend([Dimension::Product, Dimension::Pharmacy]);
    let request = session.request.clone().with_dimensions(dimensions).validate()?;

    let set = session.aggregate(&request, None).await?;
    let report = PerformanceReport {
        summary: compute_metrics(&set).presented(presentation),
        series: compute_series(&set).iter().map(|point| point.presented(presentation)).collect(),
    };

    emit(session.format, &report, |report| MetricsFormatter::performance(&report.summary))
}
