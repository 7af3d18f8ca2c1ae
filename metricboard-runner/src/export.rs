//! Export of materialized series and panel frames as CSV or JSON.
//!
//! CSV layouts:
//! - series: `time,value`
//! - frame: `time,<label 1>,<label 2>,...`, one row per tick

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use metricboard_core::MaterializedSeries;

use crate::panel::PanelFrame;

// ─── JSON export ────────────────────────────────────────────────────

/// Pretty JSON for anything the chart consumes (`{labels, values}` for a
/// series, the full frame for a panel).
pub fn export_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

pub fn export_series_csv(series: &MaterializedSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "value"])?;
    for (label, value) in series.iter() {
        wtr.write_record([label, value.to_string().as_str()])?;
    }
    finish(wtr)
}

pub fn export_frame_csv(frame: &PanelFrame) -> Result<String> {
    for s in &frame.series {
        if s.values.len() != frame.labels.len() {
            bail!(
                "series '{}' has {} values for {} labels",
                s.label,
                s.values.len(),
                frame.labels.len()
            );
        }
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["time"];
    header.extend(frame.series.iter().map(|s| s.label.as_str()));
    wtr.write_record(&header)?;

    for (i, label) in frame.labels.iter().enumerate() {
        let mut row = Vec::with_capacity(frame.series.len() + 1);
        row.push(label.clone());
        row.extend(frame.series.iter().map(|s| s.values[i].to_string()));
        wtr.write_record(&row)?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write an exported artifact, creating parent directories.
pub fn write_export(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
