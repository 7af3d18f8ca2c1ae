//! End-to-end scenarios: wire JSON in, chart-ready series out.

use chrono::{DateTime, TimeZone, Utc};
use metricboard_core::data::{parse_documents_str, parse_points_str};
use metricboard_core::{align_live_window, materialize, slice_window, Granularity};

fn utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

#[test]
fn minute_document_materializes_with_trailing_zero() {
    let batch = parse_documents_str(
        r#"[{"start": "2024-01-01T00:00:00Z", "total": 12, "minute": {"0": 5, "1": 7}}]"#,
        Granularity::Minute,
    )
    .unwrap();

    let series = materialize(
        &batch.documents,
        Granularity::Minute,
        utc("2024-01-01T00:00:00Z"),
        3,
    )
    .unwrap();

    assert_eq!(series.values(), &[5.0, 7.0, 0.0]);
    assert_eq!(
        series.labels(),
        &[
            "2024-01-01 00:00:00",
            "2024-01-01 00:01:00",
            "2024-01-01 00:02:00"
        ]
    );
}

#[test]
fn overlapping_hour_documents_resolve_to_later_sorted() {
    let batch = parse_documents_str(
        r#"[
            {"start": "2024-03-01T00:00:00Z", "hour": {"2": 10}},
            {"start": "2024-03-01T00:00:00Z", "hour": {"2": 20}}
        ]"#,
        Granularity::Hour,
    )
    .unwrap();

    let series = materialize(
        &batch.documents,
        Granularity::Hour,
        utc("2024-03-01T00:00:00Z"),
        4,
    )
    .unwrap();

    assert_eq!(series.values()[2], 20.0);
}

#[test]
fn aligner_emits_label_for_missing_minute() {
    let points = parse_points_str(
        r#"{"data": [
            {"time": "2024-01-01 00:00:00", "value": 3},
            {"time": "2024-01-01 00:01:00", "value": 4},
            {"time": "2024-01-01 00:03:00", "value": 6}
        ]}"#,
    )
    .unwrap();

    let series = align_live_window(
        &points,
        Granularity::Minute,
        utc("2024-01-01T00:00:00Z"),
        utc("2024-01-01T00:03:00Z"),
        4,
    )
    .unwrap();

    assert_eq!(series.values(), &[3.0, 4.0, 0.0, 6.0]);
    assert_eq!(series.labels()[2], "2024-01-01 00:02:00");
}

#[test]
fn slicer_pads_two_missing_hours() {
    let batch = parse_documents_str(
        &format!(
            r#"[{{"start": "2024-01-01T02:00:00Z", "minute": {{{}}}}}]"#,
            (0..60)
                .map(|m| format!(r#""{m}": {}"#, m + 1))
                .collect::<Vec<_>>()
                .join(",")
        ),
        Granularity::Minute,
    )
    .unwrap();

    let window = slice_window(&batch.documents, utc("2024-01-01T00:00:00Z"), 180).unwrap();

    assert_eq!(window.len(), 180);
    assert!(window[..120].iter().all(|v| *v == 0.0));
    assert_eq!(window[120], 1.0);
    assert_eq!(window[179], 60.0);
}

#[test]
fn daily_documents_across_leap_february() {
    let batch = parse_documents_str(
        r#"[
            {"start": "2024-02-01T00:00:00Z", "day": {"28": 1, "29": 2, "30": 99}},
            {"start": "2024-03-01T00:00:00Z", "day": {"1": 3}}
        ]"#,
        Granularity::Day,
    )
    .unwrap();

    let start = Utc.with_ymd_and_hms(2024, 2, 28, 0, 0, 0).unwrap();
    let series = materialize(&batch.documents, Granularity::Day, start, 3).unwrap();

    assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
    assert_eq!(series.labels()[2], "2024-03-01 00:00:00");
}

#[test]
fn malformed_document_is_skipped_not_fatal() {
    let batch = parse_documents_str(
        r#"[
            {"start": "2024-01-01T00:00:00Z", "second": {"0": 1}},
            {"second": {"1": 9}}
        ]"#,
        Granularity::Second,
    )
    .unwrap();
    assert_eq!(batch.skipped, 1);

    let series = materialize(
        &batch.documents,
        Granularity::Second,
        utc("2024-01-01T00:00:00Z"),
        2,
    )
    .unwrap();
    assert_eq!(series.values(), &[1.0, 0.0]);
}
