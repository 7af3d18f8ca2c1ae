//! Aligner: turns a flat point stream into a dense series for a live window.
//!
//! The backend's tabular endpoint reports one point per tick it has data
//! for, with timestamps that drift a little (its days-in-month arithmetic is
//! inexact). Each point is snapped with `round_to_nearest_tick` and matched
//! against an expected-tick cursor; ticks with no matching point become
//! zeros so the chart keeps a continuous time axis.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{MaterializedSeries, RawPoint};
use crate::error::SeriesError;
use crate::granularity::{format_label, Granularity};

/// Align `points` onto ticks from `floor(start)` up to `end`, producing
/// exactly `range` entries.
///
/// `points` must already be time-ascending: this is a single forward pass.
/// Any point that rounds to a tick the cursor has already passed is
/// consumed and discarded. That covers duplicates, out-of-order points and
/// every point earlier than `floor(start)`; none of them stall the cursor.
pub fn align_live_window(
    points: &[RawPoint],
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    range: usize,
) -> Result<MaterializedSeries, SeriesError> {
    if range == 0 {
        return Err(SeriesError::NonPositiveRange);
    }

    let mut labels = Vec::with_capacity(range);
    let mut values = Vec::with_capacity(range);
    let mut expected = granularity.floor(start);
    let mut pending = points.iter().peekable();

    while values.len() < range && expected <= end {
        while let Some(point) =
            pending.next_if(|p| granularity.round_to_nearest_tick(p.time) < expected)
        {
            debug!(time = %point.time, expected = %expected, "dropping point behind cursor");
        }
        let Some(point) = pending.peek() else {
            break;
        };

        if granularity.round_to_nearest_tick(point.time) == expected {
            values.push(point.value);
            pending.next();
        } else {
            values.push(0.0);
        }
        labels.push(format_label(expected));
        expected = granularity.add_ticks(expected, 1)?;
    }

    // Data ran out (or the window closed) early: keep ticking with zeros.
    while values.len() < range {
        values.push(0.0);
        labels.push(format_label(expected));
        expected = granularity.add_ticks(expected, 1)?;
    }

    Ok(MaterializedSeries::from_parts(labels, values))
}
