//! Clean CLI command.
//!
//! Validates a raw sales CSV, normalizes names and categories, and optionally
//! writes the surviving records to a new file.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use pharma_analytics_core::AnalyticsContext;
use pharma_analytics_data::{clean_records, CleaningReport, CleaningRules, CsvStorage, RejectedRow};
use serde::Serialize;

use super::{emit, load_config, GlobalArgs, OutputFormat};

/// Arguments for the clean command.
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Raw sales CSV (defaults to data.sales_csv from config)
    #[arg(short, long, env = "PHARMA_SALES_CSV")]
    pub input: Option<String>,

    /// Where to write the cleaned records
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct CleanSummary {
    input: String,
    output: Option<String>,
    rejected_rows: Vec<RejectedRow>,
    #[serde(flatten)]
    report: CleaningReport,
}

fn render(summary: &CleanSummary) -> String {
    let report = &summary.report;
    let mut output = String::new();
    output.push_str(&format!("Input:              {}\n", summary.input));
    output.push_str(&format!("Unreadable rows:    {}\n", summary.rejected_rows.len()));
    for row in &summary.rejected_rows {
        output.push_str(&format!("  line {:<6} {}\n", row.line, row.reason));
    }
    output.push_str(&format!("Records read:       {}\n", report.original_count));
    output.push_str(&format!("Records kept:       {}\n", report.cleaned_count));
    output.push_str(&format!("Records removed:    {}\n", report.removed_count));
    for (reason, count) in &report.removed_by_reason {
        output.push_str(&format!("  {reason:<32} {count}\n"));
    }
    output.push_str(&format!("Totals corrected:   {}\n", report.totals_corrected));
    if let Some(path) = &summary.output {
        output.push_str(&format!("Written to:         {path}\n"));
    }
    output
}

/// Runs the clean command.
///
/// # Errors
/// Returns an error if configuration is invalid or a file cannot be read or written.
pub fn run_clean(global: &GlobalArgs, args: CleanArgs) -> Result<()> {
    let config = load_config(global)?;
    let ctx = AnalyticsContext::from_config(&config.analytics)?;
    let input = args.input.unwrap_or_else(|| config.data.sales_csv.clone());

    let sales = CsvStorage::read_sales(&input, &ctx.timezone)?;
    let report = clean_records(sales.records, &CleaningRules::from_config(&config.data), Utc::now());

    if let Some(path) = &args.output {
        CsvStorage::write_sales(path, &report.records)
            .with_context(|| format!("Failed to write cleaned sales to {path}"))?;
        tracing::info!(path = %path, records = report.cleaned_count, "Cleaned sales written");
    }

    let summary = CleanSummary {
        input,
        output: args.output,
        rejected_rows: sales.rejected,
        report,
    };
    emit(args.format, &summary, render)
}
