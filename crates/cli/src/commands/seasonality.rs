//! Seasonality CLI command: sales profile by weekday and by month.

use anyhow::Result;
use pharma_analytics_core::{seasonality, MetricsFormatter};

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Runs the seasonality command.
///
/// # Errors
/// Returns an error if the query is invalid, the data cannot be loaded, or
/// the computation is cancelled.
pub async fn run_seasonality(global: &GlobalArgs, args: QueryArgs) -> Result<()> {
    let session = Session::open(global, &args)?;
    let set = session.aggregate(&session.request, None).await?;
    let profile = seasonality(&set).presented(&session.ctx().presentation);

    emit(session.format, &profile, MetricsFormatter::seasonality)
}
