//! Bucket documents and raw points: what the data provider hands the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One server-reported aggregate window covering a single parent unit
/// (one hour of per-minute counts, one day of per-hour counts, ...).
///
/// Tick indices are 0-based regardless of how the wire format keys them;
/// the parser shifts the 1-based month/day keys down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDocument {
    pub start: DateTime<Utc>,
    pub total: f64,
    pub ticks: BTreeMap<u32, f64>,
}

impl BucketDocument {
    pub fn new(start: DateTime<Utc>, ticks: BTreeMap<u32, f64>) -> Self {
        let total = ticks.values().sum();
        Self {
            start,
            total,
            ticks,
        }
    }

    /// Build from a dense slice: `values[j]` becomes tick `j`.
    pub fn from_values(start: DateTime<Utc>, values: &[f64]) -> Self {
        let ticks = values
            .iter()
            .enumerate()
            .map(|(j, v)| (j as u32, *v))
            .collect();
        Self::new(start, ticks)
    }

    /// Value at tick `j`; ticks the backend never wrote read as zero.
    pub fn tick(&self, j: u32) -> f64 {
        self.ticks.get(&j).copied().unwrap_or(0.0)
    }
}

/// One point of a flat, time-ascending stream (the tabular endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

impl RawPoint {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}
