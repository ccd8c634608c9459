//! Top-N ordering with a deterministic tie-break.
//!
//! Entries are ordered by value in the requested direction. Equal values are
//! always ordered by ascending label, then ascending key, in both directions.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregate, AggregateSet};
use crate::context::PresentationConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::metrics::{average_ticket, round};
use crate::records::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl FromStr for SortDirection {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(AnalyticsError::InvalidRange(format!(
                "unrecognized sort direction '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ascending"),
            Self::Descending => write!(f, "descending"),
        }
    }
}

/// Metric a dimension value is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Revenue,
    Quantity,
    Count,
    AverageTicket,
}

impl RankMetric {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Quantity => "quantity",
            Self::Count => "count",
            Self::AverageTicket => "average_ticket",
        }
    }

    /// Value of this metric for a cell; `None` for an undefined average.
    #[must_use]
    pub fn value_of(&self, cell: &Aggregate) -> Option<Decimal> {
        match self {
            Self::Revenue => Some(cell.revenue),
            Self::Quantity => Some(Decimal::from(cell.quantity)),
            Self::Count => Some(Decimal::from(cell.count)),
            Self::AverageTicket => average_ticket(cell.revenue, cell.count),
        }
    }

    fn is_money(self) -> bool {
        matches!(self, Self::Revenue | Self::AverageTicket)
    }
}

impl FromStr for RankMetric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "revenue" | "sales" => Ok(Self::Revenue),
            "quantity" | "units" => Ok(Self::Quantity),
            "count" | "orders" => Ok(Self::Count),
            "average_ticket" | "ticket" => Ok(Self::AverageTicket),
            other => Err(AnalyticsError::InvalidRange(format!(
                "unrecognized ranking metric '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to [`rank`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankCandidate {
    pub key: String,
    pub label: String,
    pub value: Decimal,
}

impl RankCandidate {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Decimal) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            value,
        }
    }

    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub key: String,
    pub label: String,
    pub value: Decimal,
    /// 1-based position in the output.
    pub rank: usize,
}

impl RankingEntry {
    #[must_use]
    pub fn presented(&self, metric: RankMetric, presentation: &PresentationConfig) -> Self {
        let places = if metric.is_money() {
            presentation.currency_decimal_places
        } else {
            0
        };
        Self {
            value: round(self.value, places),
            ..self.clone()
        }
    }
}

fn tie_break(a: &RankCandidate, b: &RankCandidate) -> Ordering {
    a.label.cmp(&b.label).then_with(|| a.key.cmp(&b.key))
}

/// Returns at most `limit` candidates in `direction` order.
///
/// # Errors
///
/// Returns `InvalidLimit` when `limit` is zero or negative.
pub fn rank<I>(candidates: I, direction: SortDirection, limit: i64) -> AnalyticsResult<Vec<RankingEntry>>
where
    I: IntoIterator<Item = RankCandidate>,
{
    if limit < 1 {
        return Err(AnalyticsError::InvalidLimit(limit));
    }
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);

    let mut candidates: Vec<RankCandidate> = candidates.into_iter().collect();
    candidates.sort_by(|a, b| {
        let by_value = match direction {
            SortDirection::Ascending => a.value.cmp(&b.value),
            SortDirection::Descending => b.value.cmp(&a.value),
        };
        by_value.then_with(|| tie_break(a, b))
    });

    Ok(candidates
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, candidate)| RankingEntry {
            key: candidate.key,
            label: candidate.label,
            value: candidate.value,
            rank: idx + 1,
        })
        .collect())
}

/// Ranks the values of `dimension` by `metric` over the whole range.
///
/// Values whose metric is undefined are left out. An unaggregated dimension
/// ranks nothing.
///
/// # Errors
///
/// Returns `InvalidLimit` when `limit` is zero or negative.
pub fn rank_dimension(
    set: &AggregateSet,
    dimension: Dimension,
    metric: RankMetric,
    direction: SortDirection,
    limit: i64,
) -> AnalyticsResult<Vec<RankingEntry>> {
    let cells = set.dimension_totals(dimension).unwrap_or_default();
    let candidates = cells
        .into_iter()
        .filter_map(|(key, cell)| metric.value_of(&cell).map(|value| RankCandidate::new(key, value)));
    rank(candidates, direction, limit)
}
