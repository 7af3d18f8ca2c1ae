//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over the metrics backend so the chart
//! panel can be driven by the HTTP provider in production and by an
//! in-memory mock in tests.

use chrono::{DateTime, Utc};
use thiserror::Error;

use metricboard_core::{BucketDocument, Granularity, RawPoint, SeriesError};

/// Fetch failures. None of these are retried here: the panel keeps the last
/// good series and the next refresh tick tries again.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),
}

impl From<SeriesError> for ProviderError {
    fn from(e: SeriesError) -> Self {
        ProviderError::ResponseFormat(e.to_string())
    }
}

/// The backend's query surface.
///
/// `rule_index` addresses a configured rule on the server; all times are UTC
/// and `end` is inclusive.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Bucket documents of `granularity` overlapping `[start, end]`.
    fn fetch_bucketed(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BucketDocument>, ProviderError>;

    /// Same as `fetch_bucketed`, restricted to events whose value field
    /// equals `value_type`.
    fn fetch_bucketed_by_value(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: &str,
    ) -> Result<Vec<BucketDocument>, ProviderError>;

    /// Distinct values of the rule's value field.
    fn fetch_metadata(
        &self,
        rule_index: usize,
        granularity: Granularity,
    ) -> Result<Vec<String>, ProviderError>;

    /// Flat, time-ascending point stream for `[start, end]`.
    fn fetch_tabular(
        &self,
        rule_index: usize,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        value_type: Option<&str>,
    ) -> Result<Vec<RawPoint>, ProviderError>;
}
