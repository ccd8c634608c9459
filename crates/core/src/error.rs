//! Error taxonomy for the analytics engine.
//!
//! Arithmetic edge cases (zero denominators) are not errors; they surface as
//! `None` fields on the snapshots. Cache failures are not errors either and
//! never reach this type.

use thiserror::Error;

/// Errors returned by engine operations.
///
/// Every caller coalesced behind one in-flight computation receives a clone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Start after end, unrecognized period, or an unparseable request option.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Exact trend alignment was requested over unequal bucket counts.
    #[error("range mismatch: current range has {current} buckets, previous has {previous}")]
    RangeMismatch { current: usize, previous: usize },

    /// Ranking limit was zero or negative.
    #[error("invalid limit {0}: must be at least 1")]
    InvalidLimit(i64),

    /// Caller cancelled the query or its deadline passed.
    #[error("query cancelled: {0}")]
    Cancelled(String),

    /// Configuration values could not be applied.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The sales store failed to return records.
    #[error("sales store error: {0}")]
    Store(String),
}

impl AnalyticsError {
    /// Returns true for errors caused by the request itself.
    ///
    /// These are surfaced to the caller as client errors and never retried.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange(_) | Self::RangeMismatch { .. } | Self::InvalidLimit(_)
        )
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
