//! Materializer: folds a batch of bucket documents into one dense series.
//!
//! Documents are unrolled tick by tick onto a fixed window of `range` ticks
//! starting at `start`. Anything falling outside the window is clipped, and
//! window slots no document covers stay at zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::series::tick_labels;
use crate::domain::{BucketDocument, MaterializedSeries};
use crate::error::SeriesError;
use crate::granularity::Granularity;

/// How a slot covered by more than one document is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The document sorted last by `start` wins (ties keep input order).
    #[default]
    Replace,
    /// Overlapping contributions are added together.
    Sum,
}

#[derive(Debug, Clone, Copy)]
pub struct Materializer {
    granularity: Granularity,
    overlap: OverlapPolicy,
}

impl Materializer {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            overlap: OverlapPolicy::default(),
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Materialize `documents` over `[start, start + range ticks)`.
    ///
    /// Fails only on a zero `range` or a window running off chrono's
    /// calendar. Document contents never cause an error.
    pub fn materialize(
        &self,
        documents: &[BucketDocument],
        start: DateTime<Utc>,
        range: usize,
    ) -> Result<MaterializedSeries, SeriesError> {
        if range == 0 {
            return Err(SeriesError::NonPositiveRange);
        }
        let labels = tick_labels(self.granularity, start, range)?;
        let mut values = vec![0.0; range];

        let mut sorted: Vec<&BucketDocument> = documents.iter().collect();
        sorted.sort_by_key(|doc| doc.start);

        for doc in sorted {
            self.fold_document(doc, start, &mut values);
        }

        Ok(MaterializedSeries::from_parts(labels, values))
    }

    fn fold_document(&self, doc: &BucketDocument, start: DateTime<Utc>, values: &mut [f64]) {
        let g = self.granularity;
        for j in 0..g.ticks_per_parent(doc.start) {
            let Some(tick_time) = g.checked_add_ticks(doc.start, i64::from(j)) else {
                break;
            };
            let index = g.ticks_between(start, tick_time);
            if index < 0 {
                continue;
            }
            let Some(slot) = values.get_mut(index as usize) else {
                break;
            };
            match self.overlap {
                OverlapPolicy::Replace => *slot = doc.tick(j),
                OverlapPolicy::Sum => *slot += doc.tick(j),
            }
        }
    }
}

/// Materialize with the default overlap policy.
pub fn materialize(
    documents: &[BucketDocument],
    granularity: Granularity,
    start: DateTime<Utc>,
    range: usize,
) -> Result<MaterializedSeries, SeriesError> {
    Materializer::new(granularity).materialize(documents, start, range)
}
