use clap::{Parser, Subcommand};

mod commands;

use commands::{
    CleanArgs, CustomersArgs, DashboardArgs, GlobalArgs, QueryArgs, TopArgs, TrendArgs,
};

#[derive(Parser)]
#[command(name = "pharma-analytics")]
#[command(about = "Sales analytics for pharmaceutical distribution", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full dashboard: KPIs, comparison, series, and top lists
    Dashboard(DashboardArgs),
    /// Revenue, volume, ticket, and discount summary
    Performance(QueryArgs),
    /// Revenue share per value of a dimension
    MarketShare(QueryArgs),
    /// Top values of a dimension by a metric
    Top(TopArgs),
    /// Compare a range with the one before it
    Trend(TrendArgs),
    /// Average ticket by weekday and month
    Seasonality(QueryArgs),
    /// Pharmacy segmentation and best customers
    Customers(CustomersArgs),
    /// Validate and normalize a sales CSV
    Clean(CleanArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.global.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        // stdout carries the report
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Dashboard(args) => commands::run_dashboard(&cli.global, args).await?,
        Commands::Performance(args) => commands::run_performance(&cli.global, args).await?,
        Commands::MarketShare(args) => commands::run_market_share(&cli.global, args).await?,
        Commands::Top(args) => commands::run_top(&cli.global, args).await?,
        Commands::Trend(args) => commands::run_trend(&cli.global, args).await?,
        Commands::Seasonality(args) => commands::run_seasonality(&cli.global, args).await?,
        Commands::Customers(args) => commands::run_customers(&cli.global, args).await?,
        Commands::Clean(args) => commands::run_clean(&cli.global, args)?,
    }

    Ok(())
}
