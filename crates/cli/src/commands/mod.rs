//! CLI commands for sales analytics.
//!
//! Every query command shares [`QueryArgs`] and runs through a [`Session`]:
//! configuration, the CSV-backed store, the dashboard service, and a
//! cancellation token tied to `--timeout-secs` and Ctrl-C.

pub mod clean;
pub mod customers;
pub mod dashboard;
pub mod market_share;
pub mod performance;
pub mod seasonality;
pub mod top;
pub mod trend;

pub use clean::{run_clean, CleanArgs};
pub use customers::{run_customers, CustomersArgs};
pub use dashboard::{run_dashboard, DashboardArgs};
pub use market_share::run_market_share;
pub use performance::run_performance;
pub use seasonality::run_seasonality;
pub use top::{run_top, TopArgs};
pub use trend::{run_trend, TrendArgs};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, ValueEnum};
use pharma_analytics_core::{
    AggregateSet, AnalyticsContext, AnalyticsRequest, AppConfig, CancellationToken, ConfigLoader,
    DateRange, Dimension, DimensionFilters, Period,
};
use pharma_analytics_data::{DashboardService, MemoryCache, MemorySalesStore};
use serde::Serialize;

/// Options accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(long, global = true, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay, e.g. "dev" also reads config/Config.dev.toml
    #[arg(long, global = true, env = "PHARMA_PROFILE")]
    pub profile: Option<String>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Range, slicing, and filter options shared by the query commands.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Sales CSV file (defaults to data.sales_csv from config)
    #[arg(short, long, env = "PHARMA_SALES_CSV")]
    pub data: Option<String>,

    /// First day of the range, YYYY-MM-DD (defaults to the configured lookback)
    #[arg(long)]
    pub start: Option<String>,

    /// Last day of the range, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub end: Option<String>,

    /// Bucket size: day, week, month, quarter, or year
    #[arg(long)]
    pub period: Option<String>,

    /// Dimension to slice by; repeat or comma-separate for several
    #[arg(long = "dimension", value_delimiter = ',')]
    pub dimensions: Vec<String>,

    /// Size of top-N lists
    #[arg(long, allow_negative_numbers = true)]
    pub limit: Option<i64>,

    /// Include soft-deleted sales in every range
    #[arg(long)]
    pub include_inactive: bool,

    /// Only categories containing this text (case-insensitive)
    #[arg(long)]
    pub category: Option<String>,

    /// Only this pharmacy
    #[arg(long)]
    pub pharmacy: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Abort the query after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Loads configuration, honoring `--profile`.
///
/// # Errors
///
/// Returns an error if a configuration source cannot be parsed.
pub fn load_config(global: &GlobalArgs) -> Result<AppConfig> {
    let config = match &global.profile {
        Some(profile) => ConfigLoader::load_with_profile(&global.config, profile),
        None => ConfigLoader::load_from(&global.config),
    };
    config.with_context(|| format!("Failed to load configuration from {}", global.config))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{raw}', expected YYYY-MM-DD"))
}

/// Resolves `--start`/`--end`, filling gaps with a trailing window ending today.
///
/// # Errors
///
/// Returns an error for unparseable dates or an inverted range.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    lookback_days: i64,
    today: NaiveDate,
) -> Result<DateRange> {
    let end = end.map(parse_date).transpose()?.unwrap_or(today);
    let range = match start {
        Some(start) => DateRange::new(parse_date(start)?, end)?,
        None => DateRange::trailing(end, lookback_days)?,
    };
    Ok(range)
}

/// Builds the validated request described by `args`.
///
/// # Errors
///
/// Returns an error for an unknown period or dimension, or an invalid range or limit.
pub fn build_request(args: &QueryArgs, config: &AppConfig, today: NaiveDate) -> Result<AnalyticsRequest> {
    let range = resolve_range(
        args.start.as_deref(),
        args.end.as_deref(),
        config.analytics.default_lookback_days,
        today,
    )?;
    let period = match &args.period {
        Some(raw) => raw.parse::<Period>()?,
        None => config.analytics.default_period,
    };
    let dimensions = args
        .dimensions
        .iter()
        .map(|raw| raw.parse::<Dimension>())
        .collect::<Result<Vec<_>, _>>()?;

    let request = AnalyticsRequest::new(range)
        .with_period(period)
        .with_dimensions(dimensions)
        .with_limit(args.limit.unwrap_or(config.analytics.default_limit))
        .including_inactive(args.include_inactive)
        .with_filters(DimensionFilters {
            category: args.category.clone(),
            pharmacy: args.pharmacy.clone(),
            ..DimensionFilters::default()
        });
    Ok(request.validate()?)
}

fn today_in(tz: &Tz) -> NaiveDate {
    Utc::now().with_timezone(tz).date_naive()
}

/// Everything a query command needs.
pub struct Session {
    pub service: DashboardService,
    pub request: AnalyticsRequest,
    pub cancel: CancellationToken,
    pub format: OutputFormat,
}

impl Session {
    /// # Errors
    ///
    /// Returns an error if configuration, the sales file, or the request is invalid.
    pub fn open(global: &GlobalArgs, args: &QueryArgs) -> Result<Self> {
        let config = load_config(global)?;
        let ctx = AnalyticsContext::from_config(&config.analytics)?;
        let request = build_request(args, &config, today_in(&ctx.timezone))?;

        let path = args.data.clone().unwrap_or_else(|| config.data.sales_csv.clone());
        let store = MemorySalesStore::from_csv(&path, &ctx.timezone)
            .with_context(|| format!("Failed to load sales from {path}"))?;
        tracing::info!(path = %path, records = store.len(), range = %request.range, "Sales loaded");

        let mut service = DashboardService::new(Arc::new(store), ctx);
        if config.cache.enabled {
            service = service.with_cache(
                Arc::new(MemoryCache::new(config.cache.max_entries)),
                Duration::from_secs(config.cache.ttl_seconds),
            );
        }

        let cancel = match args.timeout_secs {
            Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
            None => CancellationToken::new(),
        };
        let on_ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        Ok(Self {
            service,
            request,
            cancel,
            format: args.format,
        })
    }

    #[must_use]
    pub fn ctx(&self) -> &AnalyticsContext {
        self.service.context()
    }

    /// Aggregates `range` (the request's own range when `None`) for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching fails or the query is cancelled.
    pub async fn aggregate(&self, request: &AnalyticsRequest, range: Option<&DateRange>) -> Result<AggregateSet> {
        let range = range.unwrap_or(&request.range);
        Ok(self.service.aggregate(request, range, &self.cancel).await?)
    }
}

/// Prints `value` as JSON or through `text`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text(value)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        query: QueryArgs,
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn range_defaults_to_trailing_lookback() {
        let range = resolve_range(None, None, 30, date(2025, 3, 31)).unwrap();
        assert_eq!(range.start, date(2025, 3, 2));
        assert_eq!(range.end, date(2025, 3, 31));

        let range = resolve_range(Some("2025-01-01"), Some("2025-01-31"), 30, date(2025, 3, 31)).unwrap();
        assert_eq!(range.days(), 31);

        assert!(resolve_range(Some("2025-02-01"), Some("2025-01-01"), 30, date(2025, 3, 31)).is_err());
        assert!(resolve_range(Some("01/02/2025"), None, 30, date(2025, 3, 31)).is_err());
    }

    #[test]
    fn builds_request_from_flags() {
        let harness = Harness::parse_from([
            "test",
            "--start",
            "2025-01-01",
            "--end",
            "2025-03-31",
            "--period",
            "quarter",
            "--dimension",
            "pharmacy,category",
            "--limit",
            "5",
            "--include-inactive",
            "--category",
            "anti",
        ]);
        let request = build_request(&harness.query, &AppConfig::default(), date(2025, 4, 1)).unwrap();

        assert_eq!(request.period, Period::Quarter);
        assert_eq!(request.dimensions, vec![Dimension::Category, Dimension::Pharmacy]);
        assert_eq!(request.limit, 5);
        assert!(request.include_inactive);
        assert_eq!(request.filters.category.as_deref(), Some("anti"));
    }

    #[test]
    fn rejects_bad_options() {
        let config = AppConfig::default();
        let today = date(2025, 4, 1);

        let harness = Harness::parse_from(["test", "--limit", "-1"]);
        assert!(build_request(&harness.query, &config, today).is_err());

        let harness = Harness::parse_from(["test", "--period", "fortnight"]);
        assert!(build_request(&harness.query, &config, today).is_err());

        let harness = Harness::parse_from(["test", "--dimension", "color"]);
        assert!(build_request(&harness.query, &config, today).is_err());
    }
}
