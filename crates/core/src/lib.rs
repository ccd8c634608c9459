pub mod aggregator;
pub mod bucketer;
pub mod cancel;
pub mod config;
pub mod config_loader;
pub mod context;
pub mod customers;
pub mod dashboard;
pub mod error;
pub mod metrics;
pub mod metrics_formatter;
pub mod ranking;
pub mod records;
pub mod request;
pub mod seasonality;
pub mod traits;
pub mod trend;

pub use aggregator::{aggregate, Aggregate, AggregateSet, Aggregator};
pub use bucketer::{DateRange, Period, TimeBucket, TimeBucketer};
pub use cancel::CancellationToken;
pub use config::{AnalyticsConfig, AppConfig, CacheConfig, DataConfig};
pub use config_loader::ConfigLoader;
pub use context::{AnalyticsContext, PresentationConfig};
pub use customers::{customer_analysis, CustomerAnalysis};
pub use dashboard::{compose_dashboard, Comparison, DashboardSnapshot};
pub use error::{AnalyticsError, AnalyticsResult};
pub use metrics::{
    compute_metrics, compute_series, dimension_breakdown, BucketMetrics, MetricSnapshot, SegmentMetrics,
};
pub use metrics_formatter::MetricsFormatter;
pub use ranking::{rank, rank_dimension, RankCandidate, RankMetric, RankingEntry, SortDirection};
pub use records::{CustomerType, Dimension, SaleRecord};
pub use request::{AnalyticsRequest, DimensionFilters, StoreQuery};
pub use seasonality::{seasonality, Seasonality};
pub use traits::{AnalyticsCache, CacheError, SalesStore};
pub use trend::{
    compute_series_trend, compute_trend, half_split_growth, Alignment, BucketDelta, HalfSplitGrowth,
    MetricDelta, TrendDirection, TrendMetric, TrendResult,
};
