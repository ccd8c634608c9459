//! Market share CLI command.
//!
//! Reports each value's share of revenue for the first requested dimension.

use anyhow::Result;
use pharma_analytics_core::{compute_metrics, dimension_breakdown, MetricsFormatter};

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Runs the market-share command.
///
/// # Errors
/// Returns an error if the query is invalid, the data cannot be loaded, or
/// the computation is cancelled.
pub async fn run_market_share(global: &GlobalArgs, args: QueryArgs) -> Result<()> {
    let session = Session::open(global, &args)?;
    let presentation = &session.ctx().presentation;
    let dimension = session.request.dimensions[0];

    let set = session.aggregate(&session.request, None).await?;
    let snapshot = compute_metrics(&set).presented(presentation);
    let breakdown: Vec<_> = dimension_breakdown(&set, dimension)
        .iter()
        .map(|segment| segment.presented(presentation))
        .collect();

    emit(session.format, &breakdown, |_| MetricsFormatter::market_share(&snapshot, dimension))
}
