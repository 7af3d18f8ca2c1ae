//! WindowSlicer: a fixed-length historical slice at minute resolution.
//!
//! Documents are flattened into one contiguous buffer (zero-filling gaps
//! between them), padded in front with whole parent windows when the data
//! starts after the requested start, and then sliced. When trailing data
//! runs short the result is left-padded, so the newest values always sit at
//! the tail of the window.

use chrono::{DateTime, Utc};

use crate::domain::BucketDocument;
use crate::error::SeriesError;
use crate::granularity::Granularity;

#[derive(Debug, Clone, Copy)]
pub struct WindowSlicer {
    granularity: Granularity,
}

impl Default for WindowSlicer {
    fn default() -> Self {
        Self::new(Granularity::Minute)
    }
}

impl WindowSlicer {
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    /// `length` values starting at `desired_start`.
    pub fn slice(
        &self,
        documents: &[BucketDocument],
        desired_start: DateTime<Utc>,
        length: usize,
    ) -> Result<Vec<f64>, SeriesError> {
        if length == 0 {
            return Err(SeriesError::NonPositiveLength);
        }

        let mut sorted: Vec<&BucketDocument> = documents.iter().collect();
        sorted.sort_by_key(|doc| doc.start);
        let Some(first) = sorted.first() else {
            return Ok(vec![0.0; length]);
        };

        let g = self.granularity;
        let (padded_start, mut buffer) = if first.start > desired_start {
            // Whole parent windows (rounded up) so the padded start lands at
            // or before `desired_start`.
            let gap = -g.ticks_between(first.start, desired_start);
            let per_parent = i64::from(g.ticks_per_parent(first.start));
            let blocks = (gap + per_parent - 1) / per_parent;
            let padded_start = g.add_ticks(first.start, -(blocks * per_parent))?;
            (padded_start, vec![0.0; (blocks * per_parent) as usize])
        } else {
            (first.start, Vec::new())
        };

        for doc in &sorted {
            let pos = g.ticks_between(padded_start, doc.start);
            let Ok(pos) = usize::try_from(pos) else {
                continue;
            };
            if buffer.len() < pos {
                buffer.resize(pos, 0.0);
            }
            for j in 0..g.ticks_per_parent(doc.start) {
                let at = pos + j as usize;
                let value = doc.tick(j);
                match buffer.get_mut(at) {
                    Some(slot) => *slot = value,
                    None => buffer.push(value),
                }
            }
        }

        let offset = usize::try_from(g.ticks_between(padded_start, desired_start)).unwrap_or(0);
        let tail = buffer
            .get(offset..)
            .map(|rest| &rest[..rest.len().min(length)])
            .unwrap_or(&[]);

        let mut window = vec![0.0; length - tail.len()];
        window.extend_from_slice(tail);
        Ok(window)
    }
}

/// Minute-resolution slice of `length` values starting at `desired_start`.
pub fn slice_window(
    documents: &[BucketDocument],
    desired_start: DateTime<Utc>,
    length: usize,
) -> Result<Vec<f64>, SeriesError> {
    WindowSlicer::default().slice(documents, desired_start, length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, mi, 0).unwrap()
    }

    fn hour_of(h: u32, value: f64) -> BucketDocument {
        BucketDocument::from_values(at(h, 0), &[value; 60])
    }

    #[test]
    fn pads_front_when_data_starts_late() {
        let window = slice_window(&[hour_of(12, 3.0)], at(10, 0), 180).unwrap();
        assert_eq!(window.len(), 180);
        assert!(window[..120].iter().all(|v| *v == 0.0));
        assert!(window[120..].iter().all(|v| *v == 3.0));
    }

    #[test]
    fn unaligned_start_rounds_gap_up() {
        let window = slice_window(&[hour_of(12, 3.0)], at(10, 30), 120).unwrap();
        assert!(window[..90].iter().all(|v| *v == 0.0));
        assert!(window[90..].iter().all(|v| *v == 3.0));
    }

    #[test]
    fn fills_gaps_between_documents() {
        let window = slice_window(&[hour_of(2, 2.0), hour_of(0, 1.0)], at(0, 30), 150).unwrap();
        assert!(window[..30].iter().all(|v| *v == 1.0));
        assert!(window[30..90].iter().all(|v| *v == 0.0));
        assert!(window[90..].iter().all(|v| *v == 2.0));
    }

    #[test]
    fn short_tail_is_left_padded() {
        let window = slice_window(&[hour_of(0, 1.0)], at(0, 0), 90).unwrap();
        assert!(window[..30].iter().all(|v| *v == 0.0));
        assert!(window[30..].iter().all(|v| *v == 1.0));
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(slice_window(&[], at(0, 0), 5).unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn zero_length_is_fatal() {
        assert_eq!(
            slice_window(&[hour_of(0, 1.0)], at(0, 0), 0),
            Err(SeriesError::NonPositiveLength)
        );
    }
}
