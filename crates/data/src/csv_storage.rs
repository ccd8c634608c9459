//! Sale records in CSV files.
//!
//! Required columns: `id`, `product_name`, `product_category`, `quantity`,
//! `unit_price`, `sale_date`. Everything else is optional. A row whose numbers
//! cannot be read is rejected on its own; a malformed `sale_date` keeps the
//! row with no timestamp so aggregation can report it as skipped.

use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use csv::Writer;
use pharma_analytics_core::bucketer::{local_midnight, resolve_local};
use pharma_analytics_core::{CustomerType, SaleRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to read a sales file as a whole.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// A row that was left out, with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct SalesFile {
    pub records: Vec<SaleRecord>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Deserialize)]
struct SaleRow {
    id: String,
    product_name: Option<String>,
    product_category: Option<String>,
    #[serde(default)]
    product_code: Option<String>,
    quantity: Option<String>,
    unit_price: Option<String>,
    #[serde(default)]
    discount: Option<String>,
    #[serde(default)]
    total_price: Option<String>,
    #[serde(default)]
    pharmacy_name: Option<String>,
    #[serde(default)]
    pharmacy_location: Option<String>,
    #[serde(default)]
    customer_type: Option<String>,
    sale_date: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    sales_rep: Option<String>,
    #[serde(default)]
    campaign_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    is_active: Option<String>,
}

fn text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn number<T: FromStr>(field: &str, value: Option<&str>) -> Result<T, String> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty());
    let raw = raw.ok_or_else(|| format!("missing {field}"))?;
    raw.parse().map_err(|_| format!("invalid {field} '{raw}'"))
}

fn flag(value: Option<&str>) -> Result<bool, String> {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("true" | "1" | "yes" | "t") => Ok(true),
        Some("false" | "0" | "no" | "f") => Ok(false),
        Some(other) => Err(format!("invalid is_active '{other}'")),
    }
}

/// Parses a sale timestamp.
///
/// RFC 3339 values carry their own offset. Naive date-times and bare dates are
/// wall-clock times in `tz`; a time skipped by a DST change moves forward to
/// the end of the gap.
#[must_use]
pub fn parse_timestamp(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(resolve_local(tz, naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| local_midnight(tz, date))
}

impl SaleRow {
    fn into_record(self, tz: &Tz) -> Result<SaleRecord, String> {
        let id: i64 = number("id", Some(self.id.as_str()))?;
        let quantity: i64 = number("quantity", self.quantity.as_deref())?;
        let quantity =
            u32::try_from(quantity).map_err(|_| format!("quantity {quantity} out of range"))?;
        let unit_price: Decimal = number("unit_price", self.unit_price.as_deref())?;
        let discount: Decimal = match text(self.discount) {
            Some(raw) => number("discount", Some(raw.as_str()))?,
            None => Decimal::ZERO,
        };

        let sold_at = self.sale_date.as_deref().and_then(|raw| parse_timestamp(raw, tz));
        let mut record = SaleRecord::new(
            id,
            text(self.product_name).unwrap_or_default(),
            text(self.product_category).unwrap_or_default(),
            quantity,
            unit_price,
            discount,
            sold_at,
        );

        if let Some(total) = text(self.total_price) {
            record.total_price = number("total_price", Some(total.as_str()))?;
        }
        if let Some(code) = text(self.product_code) {
            record = record.with_code(code);
        }
        record.pharmacy_name = text(self.pharmacy_name);
        record.pharmacy_location = text(self.pharmacy_location);
        record.customer_type = text(self.customer_type).and_then(|raw| raw.parse::<CustomerType>().ok());
        record.payment_method = text(self.payment_method);
        record.sales_rep = text(self.sales_rep);
        record.campaign_id = text(self.campaign_id);
        record.notes = text(self.notes);
        record.is_active = flag(self.is_active.as_deref())?;
        Ok(record)
    }
}

pub struct CsvStorage;

impl CsvStorage {
    /// Reads sale records from `path`, interpreting naive timestamps in `tz`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the file cannot be opened or its header is unreadable.
    pub fn read_sales(path: impl AsRef<Path>, tz: &Tz) -> Result<SalesFile, LoadError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: shown.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(file);
        reader.headers().map_err(|source| LoadError::Csv {
            path: shown.clone(),
            source,
        })?;

        let mut sales = SalesFile::default();
        for (idx, result) in reader.deserialize::<SaleRow>().enumerate() {
            // header is line 1
            let line = idx as u64 + 2;
            let outcome = result
                .map_err(|e| e.to_string())
                .and_then(|row| row.into_record(tz));
            match outcome {
                Ok(record) => sales.records.push(record),
                Err(reason) => sales.rejected.push(RejectedRow { line, reason }),
            }
        }

        if !sales.rejected.is_empty() {
            warn!(
                path = %shown,
                rejected = sales.rejected.len(),
                "Some sales rows could not be read"
            );
        }
        let undated = sales.records.iter().filter(|r| r.sold_at.is_none()).count();
        debug!(path = %shown, records = sales.records.len(), undated, "Loaded sales file");

        Ok(sales)
    }

    /// Writes records in the column layout [`Self::read_sales`] expects.
    ///
    /// Timestamps are written as RFC 3339 in UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    pub fn write_sales(path: impl AsRef<Path>, records: &[SaleRecord]) -> anyhow::Result<()> {
        use anyhow::Context;

        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record([
            "id",
            "product_name",
            "product_category",
            "product_code",
            "quantity",
            "unit_price",
            "discount",
            "total_price",
            "pharmacy_name",
            "pharmacy_location",
            "customer_type",
            "sale_date",
            "payment_method",
            "sales_rep",
            "campaign_id",
            "notes",
            "is_active",
        ])?;

        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        for record in records {
            writer.write_record(&[
                record.id.to_string(),
                record.product_name.clone(),
                record.product_category.clone(),
                record.product_code.clone(),
                record.quantity.to_string(),
                record.unit_price.to_string(),
                record.discount.to_string(),
                record.total_price.to_string(),
                opt(&record.pharmacy_name),
                opt(&record.pharmacy_location),
                record
                    .customer_type
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default(),
                record.sold_at.map(|ts| ts.to_rfc3339()).unwrap_or_default(),
                opt(&record.payment_method),
                opt(&record.sales_rep),
                opt(&record.campaign_id),
                opt(&record.notes),
                record.is_active.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_timestamp_formats() {
        let tz = chrono_tz::America::Sao_Paulo;
        let expected = Utc.with_ymd_and_hms(2025, 3, 10, 17, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2025-03-10T17:30:00Z", &tz), Some(expected));
        assert_eq!(parse_timestamp("2025-03-10 14:30:00", &tz), Some(expected));
        assert_eq!(parse_timestamp("2025-03-10T14:30:00.000", &tz), Some(expected));
        assert_eq!(
            parse_timestamp("2025-03-10", &tz),
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 3, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("10/03/2025", &tz), None);
        assert_eq!(parse_timestamp("  ", &tz), None);
    }

    #[test]
    fn timestamp_in_dst_gap_moves_forward() {
        // 2018-11-04 00:00-01:00 did not exist in Sao Paulo
        let tz = chrono_tz::America::Sao_Paulo;
        let gap_end = Utc.with_ymd_and_hms(2018, 11, 4, 3, 0, 0).unwrap();

        assert_eq!(parse_timestamp("2018-11-04 00:30:00", &tz), Some(gap_end));
        assert_eq!(parse_timestamp("2018-11-04", &tz), Some(gap_end));
        assert_eq!(
            parse_timestamp("2018-11-04 01:30:00", &tz),
            Some(Utc.with_ymd_and_hms(2018, 11, 4, 3, 30, 0).unwrap())
        );
    }

    #[test]
    fn flag_accepts_common_spellings() {
        assert_eq!(flag(None), Ok(true));
        assert_eq!(flag(Some("FALSE")), Ok(false));
        assert_eq!(flag(Some("0")), Ok(false));
        assert!(flag(Some("maybe")).is_err());
    }
}
