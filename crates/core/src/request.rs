//! Validated query options.
//!
//! Every option a caller may set is a named field with a documented default;
//! nothing else reaches the aggregation core.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::bucketer::{DateRange, Period};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::records::{CustomerType, Dimension, SaleRecord};
use crate::trend::Alignment;

/// Optional equality filters applied by the sales store.
///
/// `category` matches as a case-insensitive substring; the other text filters
/// match case-insensitively on the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionFilters {
    pub category: Option<String>,
    pub product: Option<String>,
    pub pharmacy: Option<String>,
    pub location: Option<String>,
    pub representative: Option<String>,
    pub customer_type: Option<CustomerType>,
}

impl DimensionFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    #[must_use]
    pub fn matches(&self, record: &SaleRecord) -> bool {
        fn same(filter: Option<&String>, value: Option<&str>) -> bool {
            match filter {
                None => true,
                Some(wanted) => value.is_some_and(|v| v.trim().to_lowercase() == wanted.trim().to_lowercase()),
            }
        }

        let category_ok = self.category.as_ref().map_or(true, |wanted| {
            record
                .product_category
                .to_lowercase()
                .contains(&wanted.trim().to_lowercase())
        });

        category_ok
            && same(self.product.as_ref(), Some(record.product_name.as_str()))
            && same(self.pharmacy.as_ref(), record.pharmacy_name.as_deref())
            && same(self.location.as_ref(), record.pharmacy_location.as_deref())
            && same(self.representative.as_ref(), record.sales_rep.as_deref())
            && self
                .customer_type
                .map_or(true, |wanted| record.customer_type == Some(wanted))
    }

    /// Stable textual form used inside cache keys.
    #[must_use]
    pub fn canonical(&self) -> String {
        let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").to_lowercase();
        format!(
            "category={}&product={}&pharmacy={}&location={}&rep={}&customer={}",
            text(&self.category),
            text(&self.product),
            text(&self.pharmacy),
            text(&self.location),
            text(&self.representative),
            self.customer_type.map(|c| c.as_str()).unwrap_or(""),
        )
    }
}

/// What the engine asks of the sales store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreQuery {
    /// Inclusive start instant.
    pub start: DateTime<Utc>,
    /// Exclusive end instant.
    pub end: DateTime<Utc>,
    /// When true only records with `is_active = true` are returned.
    pub active_only: bool,
    pub filters: DimensionFilters,
}

impl StoreQuery {
    /// Reference predicate for stores that filter in memory.
    ///
    /// Records without a timestamp cannot be placed in the window and pass
    /// through so the engine can count them as skipped.
    #[must_use]
    pub fn matches(&self, record: &SaleRecord) -> bool {
        if self.active_only && !record.is_active {
            return false;
        }
        let in_window = record
            .sold_at
            .map_or(true, |ts| self.start <= ts && ts < self.end);
        in_window && self.filters.matches(record)
    }
}

/// A dashboard or analytics query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRequest {
    /// Inclusive date range in the reference timezone.
    pub range: DateRange,
    /// Bucket granularity. Default: `month`.
    pub period: Period,
    /// Dimensions to slice by. Default: `[category]`.
    pub dimensions: Vec<Dimension>,
    /// Size of every top-N list. Default: 10.
    pub limit: i64,
    /// Compare against the preceding range of equal length. Default: true.
    pub compare_previous: bool,
    /// How bucket series of the two ranges are paired. Default: `truncate`.
    pub alignment: Alignment,
    /// Include soft-deleted records, in both ranges. Default: false.
    pub include_inactive: bool,
    pub filters: DimensionFilters,
}

impl AnalyticsRequest {
    pub const DEFAULT_LIMIT: i64 = 10;

    #[must_use]
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            period: Period::Month,
            dimensions: vec![Dimension::Category],
            limit: Self::DEFAULT_LIMIT,
            compare_previous: true,
            alignment: Alignment::Truncate,
            include_inactive: false,
            filters: DimensionFilters::default(),
        }
    }

    #[must_use]
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: impl IntoIterator<Item = Dimension>) -> Self {
        self.dimensions = dimensions.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_comparison(mut self, compare_previous: bool, alignment: Alignment) -> Self {
        self.compare_previous = compare_previous;
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn including_inactive(mut self, include_inactive: bool) -> Self {
        self.include_inactive = include_inactive;
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: DimensionFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Checks the request and returns its normalized form: dimensions sorted
    /// and deduplicated, defaulting to `[category]` when empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` for an inverted range and `InvalidLimit` for a
    /// non-positive limit.
    pub fn validate(&self) -> AnalyticsResult<Self> {
        DateRange::new(self.range.start, self.range.end)?;
        if self.limit < 1 {
            return Err(AnalyticsError::InvalidLimit(self.limit));
        }

        let mut normalized = self.clone();
        normalized.dimensions.sort();
        normalized.dimensions.dedup();
        if normalized.dimensions.is_empty() {
            normalized.dimensions.push(Dimension::Category);
        }
        Ok(normalized)
    }

    /// Key identifying the request's result; equal for requests that differ
    /// only in dimension order or duplicates.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut dimensions: Vec<&str> = self.dimensions.iter().map(Dimension::as_str).collect();
        dimensions.sort_unstable();
        dimensions.dedup();
        format!(
            "dashboard:v1:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.range.start,
            self.range.end,
            self.period,
            dimensions.join(","),
            self.limit,
            self.compare_previous,
            self.alignment.as_str(),
            self.include_inactive,
            self.filters.canonical(),
        )
    }

    /// Store query for `range` honoring this request's filters and inactive flag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRange` if the range bounds cannot be represented.
    pub fn store_query(&self, range: &DateRange, tz: &Tz) -> AnalyticsResult<StoreQuery> {
        let (start, end) = range.bounds(tz)?;
        Ok(StoreQuery {
            start,
            end,
            active_only: !self.include_inactive,
            filters: self.filters.clone(),
        })
    }
}
