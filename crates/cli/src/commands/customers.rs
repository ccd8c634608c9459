//! Customers CLI command.
//!
//! Segments pharmacies by revenue percentile and lists the best ones.

use anyhow::Result;
use clap::Args;
use pharma_analytics_core::{customer_analysis, Dimension, MetricsFormatter};

use super::{emit, GlobalArgs, QueryArgs, Session};

/// Arguments for the customers command.
#[derive(Args, Debug, Clone)]
pub struct CustomersArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Number of top customers to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

/// Runs the customers command.
///
/// # Errors
/// Returns an error if the query is invalid, the data cannot be loaded, or
/// the computation is cancelled.
pub async fn run_customers(global: &GlobalArgs, args: CustomersArgs) -> Result<()> {
    let session = Session::open(global, &args.query)?;
    let request = session.request.clone().with_dimensions([Dimension::Pharmacy]);

    let set = session.aggregate(&request, None).await?;
    let analysis = customer_analysis(&set, args.top).presented(&session.ctx().presentation);

    emit(session.format, &analysis, MetricsFormatter::customers)
}
