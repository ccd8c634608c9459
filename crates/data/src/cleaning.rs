//! Validation and normalization of raw sale records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use pharma_analytics_core::{DataConfig, SaleRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct CleaningRules {
    pub min_product_name_len: usize,
    /// Lowercased alias to canonical category name.
    category_aliases: BTreeMap<String, String>,
}

impl CleaningRules {
    #[must_use]
    pub fn new(min_product_name_len: usize, aliases: &BTreeMap<String, String>) -> Self {
        Self {
            min_product_name_len,
            category_aliases: aliases
                .iter()
                .map(|(from, to)| (from.trim().to_lowercase(), to.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.min_product_name_len, &config.category_aliases)
    }

    fn canonical_category(&self, category: String) -> String {
        self.category_aliases
            .get(&category.to_lowercase())
            .cloned()
            .unwrap_or(category)
    }
}

impl Default for CleaningRules {
    fn default() -> Self {
        Self::from_config(&DataConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    ShortProductName,
    NonPositiveQuantity,
    NegativePrice,
    DiscountOutOfRange,
    MissingDate,
    FutureDate,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ShortProductName => "product name too short",
            Self::NonPositiveQuantity => "quantity not positive",
            Self::NegativePrice => "negative unit price",
            Self::DiscountOutOfRange => "discount outside [0, 1]",
            Self::MissingDate => "missing or invalid sale date",
            Self::FutureDate => "sale date in the future",
        };
        f.pad(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub id: i64,
    pub reason: RemovalReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleaningReport {
    pub original_count: usize,
    pub cleaned_count: usize,
    pub removed_count: usize,
    /// Removed records per reason.
    pub removed_by_reason: BTreeMap<RemovalReason, usize>,
    pub removals: Vec<Removal>,
    /// Records whose total was recomputed to a different value.
    pub totals_corrected: usize,
    #[serde(skip)]
    pub records: Vec<SaleRecord>,
}

/// Capitalizes the first letter of every alphabetic run and lowercases the rest.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(ch);
            previous_alpha = false;
        }
    }
    out
}

/// Keeps dosage units lowercase after title-casing ("400Mg" becomes "400mg").
fn fix_units(name: String) -> String {
    let mut fixed = String::with_capacity(name.len());
    let chars: Vec<char> = name.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        let after_digit = i > 0 && chars[i - 1].is_ascii_digit();
        let unit = matches!(
            (chars.get(i), chars.get(i + 1)),
            (Some('M'), Some('g' | 'l'))
        ) && !chars.get(i + 2).is_some_and(|c| c.is_alphabetic());
        if after_digit && unit {
            fixed.push('m');
        } else {
            fixed.push(*ch);
        }
    }
    fixed
}

fn normalize(text: &str) -> String {
    title_case(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn check(record: &SaleRecord, rules: &CleaningRules, now: DateTime<Utc>) -> Option<RemovalReason> {
    if record.product_name.chars().count() < rules.min_product_name_len {
        return Some(RemovalReason::ShortProductName);
    }
    if record.quantity == 0 {
        return Some(RemovalReason::NonPositiveQuantity);
    }
    if record.unit_price < Decimal::ZERO {
        return Some(RemovalReason::NegativePrice);
    }
    if record.discount < Decimal::ZERO || record.discount > Decimal::ONE {
        return Some(RemovalReason::DiscountOutOfRange);
    }
    match record.sold_at {
        None => Some(RemovalReason::MissingDate),
        Some(ts) if ts > now => Some(RemovalReason::FutureDate),
        Some(_) => None,
    }
}

/// Drops invalid records and normalizes the rest.
///
/// Product, category, and pharmacy names are trimmed and title-cased,
/// categories are mapped through the alias table, and every total is
/// recomputed from quantity, price, and discount.
#[must_use]
pub fn clean_records(records: Vec<SaleRecord>, rules: &CleaningRules, now: DateTime<Utc>) -> CleaningReport {
    let original_count = records.len();
    let mut removals = Vec::new();
    let mut removed_by_reason: BTreeMap<RemovalReason, usize> = BTreeMap::new();
    let mut totals_corrected = 0usize;
    let mut cleaned = Vec::with_capacity(records.len());

    for mut record in records {
        record.product_name = fix_units(normalize(&record.product_name));
        record.product_category = rules.canonical_category(normalize(&record.product_category));
        record.pharmacy_name = record
            .pharmacy_name
            .as_deref()
            .map(normalize)
            .filter(|name| !name.is_empty());

        if let Some(reason) = check(&record, rules, now) {
            *removed_by_reason.entry(reason).or_default() += 1;
            removals.push(Removal { id: record.id, reason });
            continue;
        }

        let total = SaleRecord::compute_total(record.quantity, record.unit_price, record.discount);
        if total != record.total_price {
            totals_corrected += 1;
            record.total_price = total;
        }
        cleaned.push(record);
    }

    for (reason, count) in &removed_by_reason {
        info!(count, reason = %reason, "Removed sales records");
    }

    CleaningReport {
        original_count,
        cleaned_count: cleaned.len(),
        removed_count: original_count - cleaned.len(),
        removed_by_reason,
        removals,
        totals_corrected,
        records: cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap()
    }

    fn sale(id: i64, name: &str, category: &str) -> SaleRecord {
        SaleRecord::new(
            id,
            name,
            category,
            2,
            dec!(10.00),
            dec!(0.10),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()),
        )
    }

    #[test]
    fn title_cases_like_a_heading() {
        assert_eq!(title_case("ibuprofeno 400MG"), "Ibuprofeno 400Mg");
        assert_eq!(title_case("ANTI-INFLAMATORIO"), "Anti-Inflamatorio");
        assert_eq!(fix_units(title_case("ibuprofeno 400MG")), "Ibuprofeno 400mg");
        assert_eq!(fix_units("Xarope 120Ml Mgx".to_string()), "Xarope 120ml Mgx");
    }

    #[test]
    fn drops_invalid_records() {
        let mut zero_qty = sale(2, "Dipirona", "Analgesics");
        zero_qty.quantity = 0;
        let mut negative = sale(3, "Dipirona", "Analgesics");
        negative.unit_price = dec!(-1);
        let mut discount = sale(4, "Dipirona", "Analgesics");
        discount.discount = dec!(1.5);
        let mut future = sale(5, "Dipirona", "Analgesics");
        future.sold_at = Some(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
        let mut undated = sale(6, "Dipirona", "Analgesics");
        undated.sold_at = None;

        let records = vec![
            sale(1, "Dipirona", "Analgesics"),
            zero_qty,
            negative,
            discount,
            future,
            undated,
            sale(7, " ab ", "Analgesics"),
        ];
        let report = clean_records(records, &CleaningRules::default(), now());

        assert_eq!(report.original_count, 7);
        assert_eq!(report.cleaned_count, 1);
        assert_eq!(report.removed_count, 6);
        assert_eq!(report.removed_by_reason[&RemovalReason::FutureDate], 1);
        assert_eq!(report.removed_by_reason[&RemovalReason::ShortProductName], 1);
        assert_eq!(
            report.removals.iter().map(|r| r.id).collect::<Vec<_>>(),
            [2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn normalizes_names_and_categories() {
        let mut record = sale(1, "  paracetamol   750mg ", " antibioticos ")
            .with_pharmacy(" drogaria   central ", "Curitiba");
        record.total_price = dec!(999);

        let report = clean_records(vec![record], &CleaningRules::default(), now());
        let cleaned = &report.records[0];

        assert_eq!(cleaned.product_name, "Paracetamol 750mg");
        assert_eq!(cleaned.product_category, "Antibiotics");
        assert_eq!(cleaned.pharmacy_name.as_deref(), Some("Drogaria Central"));
        assert_eq!(cleaned.total_price, dec!(18.00));
        assert_eq!(report.totals_corrected, 1);
    }
}
