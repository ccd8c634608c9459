//! Average ticket by weekday and calendar month.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregate, AggregateSet};
use crate::context::PresentationConfig;
use crate::metrics::{average_ticket, round};

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalEntry {
    pub label: String,
    pub record_count: u64,
    pub revenue: Decimal,
    /// Revenue per sale; `None` when nothing sold.
    pub average_revenue: Option<Decimal>,
}

impl SeasonalEntry {
    fn from_cell(label: &str, cell: &Aggregate) -> Self {
        Self {
            label: label.to_string(),
            record_count: cell.count,
            revenue: cell.revenue,
            average_revenue: average_ticket(cell.revenue, cell.count),
        }
    }

    fn presented(&self, places: u32) -> Self {
        Self {
            revenue: round(self.revenue, places),
            average_revenue: self.average_revenue.map(|v| round(v, places)),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seasonality {
    /// Sunday first.
    pub by_weekday: Vec<SeasonalEntry>,
    /// January first.
    pub by_month: Vec<SeasonalEntry>,
}

impl Seasonality {
    /// Weekday with the highest average revenue; earliest in the week on ties.
    #[must_use]
    pub fn peak_weekday(&self) -> Option<&SeasonalEntry> {
        peak(&self.by_weekday)
    }

    #[must_use]
    pub fn peak_month(&self) -> Option<&SeasonalEntry> {
        peak(&self.by_month)
    }

    #[must_use]
    pub fn presented(&self, presentation: &PresentationConfig) -> Self {
        let places = presentation.currency_decimal_places;
        Self {
            by_weekday: self.by_weekday.iter().map(|e| e.presented(places)).collect(),
            by_month: self.by_month.iter().map(|e| e.presented(places)).collect(),
        }
    }
}

fn peak(entries: &[SeasonalEntry]) -> Option<&SeasonalEntry> {
    entries
        .iter()
        .filter_map(|e| e.average_revenue.map(|avg| (avg, e)))
        .fold(None, |best: Option<(Decimal, &SeasonalEntry)>, (avg, entry)| match best {
            Some((top, _)) if top >= avg => best,
            _ => Some((avg, entry)),
        })
        .map(|(_, entry)| entry)
}

/// Seasonal profile of an aggregate set, in the reference timezone it was
/// built with.
#[must_use]
pub fn seasonality(set: &AggregateSet) -> Seasonality {
    Seasonality {
        by_weekday: WEEKDAYS
            .iter()
            .zip(&set.by_weekday)
            .map(|(label, cell)| SeasonalEntry::from_cell(label, cell))
            .collect(),
        by_month: MONTHS
            .iter()
            .zip(&set.by_month)
            .map(|(label, cell)| SeasonalEntry::from_cell(label, cell))
            .collect(),
    }
}
