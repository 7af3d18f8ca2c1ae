//! JSON wire format parsing for backend responses.
//!
//! A bucket document on the wire looks like
//! `{"start": "2024-01-01T00:00:00Z", "total": 12, "minute": {"0": 5, "1": 7}}`
//! where exactly one of `month|day|hour|minute|second` carries the tick map.
//! Month and day keys count from 1, the rest from 0; parsing normalizes all
//! of them to 0-based tick indices.
//!
//! Parsing is best-effort per batch: a document missing its `start` or its
//! tick map is skipped and counted, the rest of the batch survives.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{BucketDocument, RawPoint};
use crate::error::SeriesError;
use crate::granularity::{format_iso, format_label, Granularity, LABEL_FORMAT};

/// Documents that survived parsing, plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    pub documents: Vec<BucketDocument>,
    pub skipped: usize,
}

/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`, offsets allowed) or the label
/// format (`2024-01-01 00:00:00`, read as UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SeriesError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LABEL_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| SeriesError::InvalidTimestamp(raw.to_string()))
}

/// Parse one bucket document for `granularity`.
pub fn parse_document(value: &Value, granularity: Granularity) -> Result<BucketDocument, SeriesError> {
    let obj = value.as_object().ok_or_else(|| malformed("document is not an object"))?;

    let start = match obj.get("start") {
        Some(Value::String(raw)) => {
            parse_timestamp(raw).map_err(|e| malformed(&format!("bad start: {e}")))?
        }
        Some(_) => return Err(malformed("start is not a string")),
        None => return Err(malformed("missing start")),
    };

    let field = granularity.field_name();
    let tick_map = obj
        .get(field)
        .and_then(Value::as_object)
        .ok_or_else(|| malformed(&format!("missing {field} tick map")))?;
    let ticks = parse_ticks(tick_map, granularity);

    let total = obj
        .get("total")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| ticks.values().sum());

    Ok(BucketDocument {
        start,
        total,
        ticks,
    })
}

/// Parse a `/data` response body: a JSON array of documents (or `null`,
/// which the backend sends for an empty result).
pub fn parse_documents(value: &Value, granularity: Granularity) -> Result<ParsedBatch, SeriesError> {
    let items = match value {
        Value::Null => return Ok(ParsedBatch::default()),
        Value::Array(items) => items,
        _ => return Err(SeriesError::MalformedResponse("expected an array of documents".into())),
    };

    let mut batch = ParsedBatch {
        documents: Vec::with_capacity(items.len()),
        skipped: 0,
    };
    for (i, item) in items.iter().enumerate() {
        match parse_document(item, granularity) {
            Ok(doc) => batch.documents.push(doc),
            Err(e) => {
                debug!(index = i, error = %e, "skipping bucket document");
                batch.skipped += 1;
            }
        }
    }
    Ok(batch)
}

pub fn parse_documents_str(json: &str, granularity: Granularity) -> Result<ParsedBatch, SeriesError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SeriesError::MalformedResponse(e.to_string()))?;
    parse_documents(&value, granularity)
}

/// Parse a `/tabular` response body: `{"data": [{"time": ..., "value": ...}]}`.
/// A bare array is accepted too. Points with an unreadable time are dropped.
pub fn parse_points(value: &Value) -> Result<Vec<RawPoint>, SeriesError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(SeriesError::MalformedResponse("data is not an array".into())),
        },
        Value::Null => return Ok(Vec::new()),
        _ => return Err(SeriesError::MalformedResponse("expected tabular data".into())),
    };

    let mut points = Vec::with_capacity(items.len());
    for item in items {
        let time = item.get("time").and_then(Value::as_str).map(parse_timestamp);
        match time {
            Some(Ok(time)) => {
                let value = item.get("value").and_then(Value::as_f64).unwrap_or(0.0);
                points.push(RawPoint { time, value });
            }
            _ => debug!(point = %item, "skipping point without a readable time"),
        }
    }
    Ok(points)
}

pub fn parse_points_str(json: &str) -> Result<Vec<RawPoint>, SeriesError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SeriesError::MalformedResponse(e.to_string()))?;
    parse_points(&value)
}

/// Parse a `/metadata` response body: `{"values": ["a", "b"]}`.
pub fn parse_metadata(value: &Value) -> Result<Vec<String>, SeriesError> {
    match value.get("values") {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(SeriesError::MalformedResponse("values is not an array".into())),
    }
}

/// Encode a document in the backend's wire shape (1-based keys for
/// month/day).
pub fn document_to_wire(doc: &BucketDocument, granularity: Granularity) -> Value {
    let offset = granularity.first_tick_index();
    let ticks: Map<String, Value> = doc
        .ticks
        .iter()
        .map(|(j, v)| ((j + offset).to_string(), Value::from(*v)))
        .collect();

    let mut obj = Map::new();
    obj.insert("start".into(), Value::String(format_iso(doc.start)));
    obj.insert("total".into(), Value::from(doc.total));
    obj.insert(granularity.field_name().into(), Value::Object(ticks));
    Value::Object(obj)
}

/// Encode points in the tabular endpoint's shape.
pub fn points_to_wire(points: &[RawPoint]) -> Value {
    let data: Vec<Value> = points
        .iter()
        .map(|p| serde_json::json!({ "time": format_label(p.time), "value": p.value }))
        .collect();
    serde_json::json!({ "data": data })
}

fn parse_ticks(map: &Map<String, Value>, granularity: Granularity) -> BTreeMap<u32, f64> {
    let offset = granularity.first_tick_index();
    map.iter()
        .filter_map(|(key, value)| {
            let wire_index: u32 = key.parse().ok()?;
            let tick = wire_index.checked_sub(offset)?;
            Some((tick, value.as_f64()?))
        })
        .collect()
}

fn malformed(reason: &str) -> SeriesError {
    SeriesError::MalformedBucketDocument {
        reason: reason.to_string(),
    }
}
