//! metricboard core: the time-series materialization engine.
//!
//! This crate turns sparse, overlapping, slightly misaligned aggregate
//! windows reported by a metrics backend into dense fixed-length series
//! ready for charting:
//! - Granularity catalog (calendar units, tick counts, rounding, tick math)
//! - Domain types (bucket documents, raw points, rules, series)
//! - Wire format parsing for the backend's JSON responses
//! - Materializer, aligner and window slicer
//!
//! Nothing here performs I/O; fetching belongs to `metricboard-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod granularity;

pub use domain::{BucketDocument, GranularityFlags, GranularitySet, MaterializedSeries, RawPoint, Rule};
pub use engine::{align_live_window, materialize, slice_window, Materializer, OverlapPolicy, WindowSlicer};
pub use error::SeriesError;
pub use granularity::{CalendarUnit, Granularity};
