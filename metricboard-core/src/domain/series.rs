//! MaterializedSeries, the dense chart-ready output of every engine pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SeriesError;
use crate::granularity::{format_label, Granularity};

/// Dense, gap-filled, calendar-aligned values with matching labels.
///
/// `labels` and `values` always have the same length, and consecutive labels
/// are exactly one tick apart. A series is built once per refresh and
/// replaced wholesale, so there are no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedSeries {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl MaterializedSeries {
    /// `range` zeros labelled `start, start + 1 tick, ...`.
    pub fn zeros(
        granularity: Granularity,
        start: DateTime<Utc>,
        range: usize,
    ) -> Result<Self, SeriesError> {
        if range == 0 {
            return Err(SeriesError::NonPositiveRange);
        }
        Ok(Self {
            labels: tick_labels(granularity, start, range)?,
            values: vec![0.0; range],
        })
    }

    pub(crate) fn from_parts(labels: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(labels.len(), values.len());
        Self { labels, values }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(label, value)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<f64>) {
        (self.labels, self.values)
    }
}

/// Labels for `range` consecutive ticks starting at `start`.
///
/// Each label is computed from `start` directly rather than by repeated
/// addition, so month clamping never drifts.
pub(crate) fn tick_labels(
    granularity: Granularity,
    start: DateTime<Utc>,
    range: usize,
) -> Result<Vec<String>, SeriesError> {
    (0..range)
        .map(|k| granularity.add_ticks(start, k as i64).map(format_label))
        .collect()
}
