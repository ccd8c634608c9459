use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::records::SaleRecord;
use crate::request::StoreQuery;

/// Source of sale records.
///
/// Implementations may return records in any order. Records without a
/// timestamp cannot be range-filtered and should be passed through.
#[async_trait]
pub trait SalesStore: Send + Sync {
    async fn fetch(&self, query: &StoreQuery) -> Result<Vec<SaleRecord>>;
}

/// Failure of the optional result cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out")]
    Timeout,

    #[error("cache payload rejected: {0}")]
    Payload(String),
}

/// Key/TTL store for serialized results. Best-effort: callers treat every
/// error as a miss.
#[async_trait]
pub trait AnalyticsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
