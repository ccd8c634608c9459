#![allow(clippy::format_push_string)]

use rust_decimal::Decimal;

use crate::customers::CustomerAnalysis;
use crate::dashboard::DashboardSnapshot;
use crate::metrics::{BucketMetrics, MetricSnapshot};
use crate::ranking::RankingEntry;
use crate::records::Dimension;
use crate::seasonality::{SeasonalEntry, Seasonality};
use crate::trend::{MetricDelta, TrendMetric, TrendResult};

const HEAVY: &str = "═══════════════════════════════════════════════════════════════\n";
const LIGHT: &str = "───────────────────────────────────────────────────────────────\n";

/// Plain-text rendering of analytics results for terminals.
///
/// Expects values that were already rounded with `presented`.
pub struct MetricsFormatter;

fn or_na(value: Option<Decimal>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn pct(value: Option<Decimal>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v}%"))
}

fn banner(output: &mut String, title: &str) {
    output.push('\n');
    output.push_str(HEAVY);
    output.push_str(&format!("{title:^63}\n"));
    output.push_str(HEAVY);
    output.push('\n');
}

fn section(output: &mut String, title: &str) {
    output.push_str(title);
    output.push('\n');
    output.push_str(LIGHT);
}

fn metric_name(metric: TrendMetric) -> &'static str {
    match metric {
        TrendMetric::Revenue => "Revenue",
        TrendMetric::Quantity => "Quantity",
        TrendMetric::RecordCount => "Sales",
        TrendMetric::AverageTicket => "Average Ticket",
    }
}

impl MetricsFormatter {
    #[must_use]
    pub fn dashboard(dashboard: &DashboardSnapshot) -> String {
        let mut output = String::new();
        banner(&mut output, "SALES DASHBOARD");
        output.push_str(&format!("Range:                 {}\n", dashboard.range));
        output.push_str(&format!("Period:                {}\n\n", dashboard.period));

        Self::push_summary(&mut output, &dashboard.current);

        if let Some(comparison) = &dashboard.comparison {
            section(&mut output, &format!("Versus {}", comparison.range));
            Self::push_trend(&mut output, &comparison.trend);
            output.push('\n');
        }

        section(&mut output, "Growth");
        output.push_str(&format!(
            "First Half:            {}\n",
            dashboard.growth.first_half_revenue
        ));
        output.push_str(&format!(
            "Second Half:           {} (from {})\n",
            dashboard.growth.second_half_revenue, dashboard.growth.split_day
        ));
        output.push_str(&format!(
            "Growth Rate:           {}\n\n",
            pct(dashboard.growth.growth_rate_pct)
        ));

        for (dimension, entries) in &dashboard.top {
            section(&mut output, &format!("Top {dimension}"));
            Self::push_ranking(&mut output, entries);
            output.push('\n');
        }

        section(&mut output, "Recent Trend");
        Self::push_series(&mut output, &dashboard.recent_trend);

        output.push('\n');
        output.push_str(HEAVY);
        if dashboard.skipped_records > 0 {
            output.push_str(&format!(
                "\n⚠️  {} records without a sale date were excluded.\n",
                dashboard.skipped_records
            ));
        }
        output
    }

    #[must_use]
    pub fn performance(snapshot: &MetricSnapshot) -> String {
        let mut output = String::new();
        banner(&mut output, "SALES PERFORMANCE");
        output.push_str(&format!(
            "Range:                 {} to {}\n\n",
            snapshot.period_start, snapshot.period_end
        ));
        Self::push_summary(&mut output, snapshot);
        output.push_str(HEAVY);
        output
    }

    #[must_use]
    pub fn market_share(snapshot: &MetricSnapshot, dimension: Dimension) -> String {
        let mut output = String::new();
        banner(&mut output, &format!("MARKET SHARE BY {}", dimension.as_str().to_uppercase()));

        match snapshot.market_share.get(&dimension) {
            Some(shares) if !shares.is_empty() => {
                let mut rows: Vec<_> = shares.iter().collect();
                rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                for (key, share) in rows {
                    output.push_str(&format!("{key:<40} {:>20}\n", pct(*share)));
                }
            }
            _ => output.push_str("No sales in range.\n"),
        }
        output.push('\n');
        output.push_str(HEAVY);
        output
    }

    #[must_use]
    pub fn ranking(title: &str, entries: &[RankingEntry]) -> String {
        let mut output = String::new();
        banner(&mut output, title);
        Self::push_ranking(&mut output, entries);
        output.push('\n');
        output.push_str(HEAVY);
        output
    }

    #[must_use]
    pub fn trend(trend: &TrendResult) -> String {
        let mut output = String::new();
        banner(&mut output, "PERIOD COMPARISON");
        output.push_str(&format!(
            "Current:               {} to {}\n",
            trend.current_start, trend.current_end
        ));
        output.push_str(&format!(
            "Previous:              {} to {}\n\n",
            trend.previous_start, trend.previous_end
        ));
        Self::push_trend(&mut output, trend);
        output.push('\n');
        output.push_str(HEAVY);
        output
    }

    #[must_use]
    pub fn seasonality(profile: &Seasonality) -> String {
        let mut output = String::new();
        banner(&mut output, "SEASONALITY");

        let rows = |output: &mut String, entries: &[SeasonalEntry]| {
            for entry in entries {
                output.push_str(&format!(
                    "{:<12} {:>8} sales   avg {:>14}\n",
                    entry.label,
                    entry.record_count,
                    or_na(entry.average_revenue)
                ));
            }
        };

        section(&mut output, "By Weekday");
        rows(&mut output, &profile.by_weekday);
        output.push('\n');
        section(&mut output, "By Month");
        rows(&mut output, &profile.by_month);
        output.push('\n');

        if let Some(peak) = profile.peak_weekday() {
            output.push_str(&format!("Best Weekday:          {}\n", peak.label));
        }
        if let Some(peak) = profile.peak_month() {
            output.push_str(&format!("Best Month:            {}\n", peak.label));
        }
        output.push_str(HEAVY);
        output
    }

    #[must_use]
    pub fn customers(analysis: &CustomerAnalysis) -> String {
        let mut output = String::new();
        banner(&mut output, "CUSTOMER ANALYSIS");

        output.push_str(&format!("Customers:             {}\n", analysis.total_customers));
        output.push_str(&format!(
            "Average Value:         {}\n",
            or_na(analysis.average_customer_value)
        ));
        output.push_str(&format!(
            "Segments:              high {} / medium {} / low {}\n\n",
            analysis.segments.high_value, analysis.segments.medium_value, analysis.segments.low_value
        ));

        section(&mut output, "Top Customers");
        for customer in &analysis.top_customers {
            let last = customer
                .last_order_at
                .map_or_else(|| "-".to_string(), |ts| ts.format("%Y-%m-%d").to_string());
            output.push_str(&format!(
                "{:<32} {:>14} {:>6} orders  last {}\n",
                customer.pharmacy_name, customer.total_revenue, customer.total_orders, last
            ));
        }
        output.push('\n');
        output.push_str(HEAVY);
        output
    }

    fn push_summary(output: &mut String, snapshot: &MetricSnapshot) {
        section(output, "Summary");
        output.push_str(&format!("Total Revenue:         {}\n", snapshot.total_revenue));
        output.push_str(&format!("Gross Revenue:         {}\n", snapshot.gross_revenue));
        output.push_str(&format!(
            "Discounts:             {} ({})\n",
            snapshot.discount_total,
            pct(snapshot.discount_rate)
        ));
        output.push_str(&format!("Units Sold:            {}\n", snapshot.total_quantity));
        output.push_str(&format!("Sales:                 {}\n", snapshot.record_count));
        output.push_str(&format!(
            "Average Ticket:        {}\n",
            or_na(snapshot.average_ticket)
        ));
        for (dimension, count) in &snapshot.distinct_values {
            output.push_str(&format!("{:<23}{count}\n", format!("Distinct {dimension}:")));
        }
        output.push('\n');
    }

    fn push_trend(output: &mut String, trend: &TrendResult) {
        for delta in &trend.metrics {
            output.push_str(&Self::delta_line(delta));
        }
    }

    fn delta_line(delta: &MetricDelta) -> String {
        let direction = delta
            .direction
            .map_or_else(|| "n/a".to_string(), |d| d.to_string());
        format!(
            "{:<23}{} -> {}  ({}, {})\n",
            format!("{}:", metric_name(delta.metric)),
            or_na(delta.previous),
            or_na(delta.current),
            pct(delta.percent_delta),
            direction
        )
    }

    fn push_ranking(output: &mut String, entries: &[RankingEntry]) {
        if entries.is_empty() {
            output.push_str("No entries.\n");
        }
        for entry in entries {
            output.push_str(&format!("{:>3}. {:<40} {:>15}\n", entry.rank, entry.label, entry.value));
        }
    }

    fn push_series(output: &mut String, series: &[BucketMetrics]) {
        for point in series {
            output.push_str(&format!(
                "{:<12} {:>15} {:>8} sales\n",
                point.label, point.revenue, point.record_count
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use crate::bucketer::{DateRange, Period};
    use crate::cancel::CancellationToken;
    use crate::context::AnalyticsContext;
    use crate::dashboard::compose_dashboard;
    use crate::metrics::compute_metrics;
    use crate::records::SaleRecord;
    use crate::request::AnalyticsRequest;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap()
    }

    fn records() -> Vec<SaleRecord> {
        vec![SaleRecord::new(
            1,
            "Dipirona",
            "Analgesics",
            3,
            dec!(5.50),
            dec!(0),
            Some(Utc.with_ymd_and_hms(2025, 6, 12, 10, 0, 0).unwrap()),
        )]
    }

    #[test]
    fn dashboard_text_contains_sections() {
        let dashboard = compose_dashboard(
            &records(),
            &[],
            &AnalyticsRequest::new(range()),
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap();
        let text = MetricsFormatter::dashboard(&dashboard);

        assert!(text.contains("SALES DASHBOARD"));
        assert!(text.contains("Total Revenue:         16.50"));
        assert!(text.contains("Top category"));
        assert!(text.contains("Analgesics"));
        assert!(text.contains("N/A"), "percent change from an empty range is undefined");
    }

    #[test]
    fn empty_market_share_says_so() {
        let set = aggregate(
            std::iter::empty(),
            &range(),
            Period::Month,
            &[Dimension::Category],
            &AnalyticsContext::utc(),
            &CancellationToken::none(),
        )
        .unwrap();
        let text = MetricsFormatter::market_share(&compute_metrics(&set), Dimension::Category);
        assert!(text.contains("No sales in range."));
    }
}
