//! Structured error type for the materialization engine.
//!
//! Only static-argument problems (bad granularity code, zero range) are fatal
//! to an engine call. Data-shape problems inside a batch surface as
//! `MalformedBucketDocument` from the parser and are skipped by callers.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("invalid granularity code '{code}' (expected one of M, D, h, m, s)")]
    InvalidGranularityCode { code: String },

    #[error("range must be positive")]
    NonPositiveRange,

    #[error("window length must be positive")]
    NonPositiveLength,

    #[error("malformed bucket document: {reason}")]
    MalformedBucketDocument { reason: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(String),
}
