//! Dashboard CLI command.
//!
//! Composes the full dashboard through the service, so repeated identical
//! queries are served from the cache when it is enabled.

use anyhow::Result;
use clap::Args;
use pharma_analytics_core::{Alignment, MetricsFormatter};

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Arguments for the dashboard command.
#[derive(Args, Debug, Clone)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Skip the comparison with the preceding range
    #[arg(long)]
    pub no_compare: bool,

    /// Pair series buckets only when both ranges have the same count
    #[arg(long)]
    pub exact: bool,
}

/// Runs the dashboard command.
///
/// # Errors
/// Returns an error if the query is invalid, the data cannot be loaded, or
/// the computation is cancelled.
pub async fn run_dashboard(global: &GlobalArgs, args: DashboardArgs) -> Result<()> {
    let session = Session::open(global, &args.query)?;
    let alignment = if args.exact { Alignment::Exact } else { Alignment::Truncate };
    let request = session.request.clone().with_comparison(!args.no_compare, alignment);

    let dashboard = session.service.dashboard(&request, &session.cancel).await?;
    emit(session.format, dashboard.as_ref(), MetricsFormatter::dashboard)
}
