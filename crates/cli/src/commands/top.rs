//! Top-N CLI command.
//!
//! Ranks the values of one dimension (products unless `--dimension` says
//! otherwise) by revenue, quantity, sale count, or average ticket.

use anyhow::Result;
use clap::Args;
use pharma_analytics_core::{rank_dimension, Dimension, MetricsFormatter, RankMetric, SortDirection};

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Arguments for the top command.
#[derive(Args, Debug, Clone)]
pub struct TopArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Metric to rank by: revenue, quantity, count, or average-ticket
    #[arg(long, default_value = "revenue")]
    pub metric: String,

    /// Sort direction: desc or asc
    #[arg(long, default_value = "desc")]
    pub direction: String,
}

/// Runs the top command.
///
/// # Errors
/// Returns an error if the query or ranking options are invalid, the data
/// cannot be loaded, or the computation is cancelled.
pub async fn run_top(global: &GlobalArgs, args: TopArgs) -> Result<()> {
    let metric: RankMetric = args.metric.parse()?;
    let direction: SortDirection = args.direction.parse()?;

    let mut query = args.query;
    if query.dimensions.is_empty() {
        query.dimensions.push(Dimension::Product.as_str().to_string());
    }
    let session = Session::open(global, &query)?;
    let dimension = session.request.dimensions[0];

    let set = session.aggregate(&session.request, None).await?;
    let entries: Vec<_> = rank_dimension(&set, dimension, metric, direction, session.request.limit)?
        .iter()
        .map(|entry| entry.presented(metric, &session.ctx().presentation))
        .collect();

    let title = format!(
        "TOP {} {} BY {}",
        session.request.limit,
        dimension.as_str().to_uppercase(),
        metric.as_str().to_uppercase()
    );
    emit(session.format, &entries, |entries| MetricsFormatter::ranking(&title, entries))
}
