//! Pharmacy (customer) value segmentation.
//!
//! Customers are the known values of the pharmacy dimension. Segment
//! thresholds are the 66th and 90th percentiles of per-customer revenue,
//! interpolated linearly between order statistics.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregateSet;
use crate::context::PresentationConfig;
use crate::metrics::{average_ticket, round};
use crate::records::{Dimension, UNKNOWN_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePercentiles {
    pub p33: Decimal,
    pub p66: Decimal,
    pub p90: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSegments {
    /// Revenue at or above p90.
    pub high_value: usize,
    /// Revenue in `[p66, p90)`.
    pub medium_value: usize,
    /// Revenue below p66.
    pub low_value: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub pharmacy_name: String,
    pub total_revenue: Decimal,
    pub total_quantity: u64,
    pub total_orders: u64,
    pub average_order_value: Option<Decimal>,
    pub last_order_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAnalysis {
    pub total_customers: usize,
    /// `None` without customers.
    pub percentiles: Option<RevenuePercentiles>,
    pub segments: CustomerSegments,
    /// Highest revenue first, ties by name.
    pub top_customers: Vec<CustomerSummary>,
    /// Mean revenue per customer; `None` without customers.
    pub average_customer_value: Option<Decimal>,
}

impl CustomerAnalysis {
    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        let money = |v: Decimal| round(v, presentation.currency_decimal_places);
        Self {
            percentiles: self.percentiles.as_ref().map(|p| RevenuePercentiles {
                p33: money(p.p33),
                p66: money(p.p66),
                p90: money(p.p90),
            }),
            top_customers: self
                .top_customers
                .iter()
                .map(|c| CustomerSummary {
                    total_revenue: money(c.total_revenue),
                    average_order_value: c.average_order_value.map(money),
                    ..c.clone()
                })
                .collect(),
            average_customer_value: self.average_customer_value.map(money),
            ..self.clone()
        }
    }
}

/// Percentile `pct` (0..=100) of ascending-sorted `sorted`, linear between ranks.
#[must_use]
pub fn percentile(sorted: &[Decimal], pct: u32) -> Option<Decimal> {
    let last = sorted.len().checked_sub(1)?;
    let position = Decimal::from(pct.min(100)) * Decimal::from(last) / Decimal::ONE_HUNDRED;
    let lower = position.floor();
    let fraction = position - lower;
    let lo = lower.to_usize()?.min(last);
    let hi = (lo + 1).min(last);
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}

/// Segments pharmacies by revenue and lists the `top` best customers.
#[must_use]
pub fn customer_analysis(set: &AggregateSet, top: usize) -> CustomerAnalysis {
    let mut customers: Vec<CustomerSummary> = set
        .dimension_totals(Dimension::Pharmacy)
        .unwrap_or_default()
        .into_iter()
        .filter(|(name, _)| name != UNKNOWN_KEY)
        .map(|(name, cell)| CustomerSummary {
            pharmacy_name: name,
            total_revenue: cell.revenue,
            total_quantity: cell.quantity,
            total_orders: cell.count,
            average_order_value: average_ticket(cell.revenue, cell.count),
            last_order_at: cell.last_sale,
        })
        .collect();

    let mut revenues: Vec<Decimal> = customers.iter().map(|c| c.total_revenue).collect();
    revenues.sort();

    let percentiles = match (
        percentile(&revenues, 33),
        percentile(&revenues, 66),
        percentile(&revenues, 90),
    ) {
        (Some(p33), Some(p66), Some(p90)) => Some(RevenuePercentiles { p33, p66, p90 }),
        _ => None,
    };

    let segments = percentiles
        .as_ref()
        .map(|p| CustomerSegments {
            high_value: revenues.iter().filter(|r| **r >= p.p90).count(),
            medium_value: revenues.iter().filter(|r| **r >= p.p66 && **r < p.p90).count(),
            low_value: revenues.iter().filter(|r| **r < p.p66).count(),
        })
        .unwrap_or_default();

    let total: Decimal = revenues.iter().copied().sum();
    let average_customer_value = average_ticket(total, revenues.len() as u64);

    customers.sort_by(|a, b| {
        b.total_revenue
            .cmp(&a.total_revenue)
            .then_with(|| a.pharmacy_name.cmp(&b.pharmacy_name))
    });
    let total_customers = customers.len();
    customers.truncate(top);

    CustomerAnalysis {
        total_customers,
        percentiles,
        segments,
        top_customers: customers,
        average_customer_value,
    }
}
