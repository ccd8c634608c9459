use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono_tz::Tz;
use pharma_analytics_core::{SaleRecord, SalesStore, StoreQuery};
use tracing::debug;

use crate::csv_storage::CsvStorage;

/// Sales store over an immutable in-memory snapshot.
///
/// Cloning shares the snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemorySalesStore {
    records: Arc<Vec<SaleRecord>>,
}

impl MemorySalesStore {
    #[must_use]
    pub fn new(records: Vec<SaleRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Loads a CSV file; unreadable rows are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_csv(path: impl AsRef<Path>, tz: &Tz) -> Result<Self> {
        let sales = CsvStorage::read_sales(path, tz)?;
        Ok(Self::new(sales.records))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[SaleRecord] {
        &self.records
    }
}

#[async_trait]
impl SalesStore for MemorySalesStore {
    async fn fetch(&self, query: &StoreQuery) -> Result<Vec<SaleRecord>> {
        let matched: Vec<SaleRecord> = self
            .records
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        debug!(
            start = %query.start,
            end = %query.end,
            matched = matched.len(),
            "Fetched sales"
        );
        Ok(matched)
    }
}
