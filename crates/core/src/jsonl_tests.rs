// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::alerts::AlertLogEntry;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn entry(secs: i64) -> AlertLogEntry {
    AlertLogEntry::Exit {
        participant_id: "s1".into(),
        name: "Ada".into(),
        distance_km: 0.3,
        time: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

#[test]
fn missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let records: Vec<AlertLogEntry> = read_all(&dir.path().join("missing.jsonl")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn appended_records_keep_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("alerts.jsonl");

    append(&path, &entry(1)).unwrap();
    append(&path, &entry(2)).unwrap();

    let records: Vec<AlertLogEntry> = read_all(&path).unwrap();
    assert_eq!(records, vec![entry(1), entry(2)]);
}

#[test]
fn skips_blank_and_comment_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("track.jsonl");
    std::fs::write(
        &path,
        "# recorded on the bus\n\n{\"latitude\":1.0,\"longitude\":2.0}\n   \n{\"latitude\":3.0,\"longitude\":4.0}\n",
    )
    .unwrap();

    let records: Vec<crate::geo::Coordinate> = read_all(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].latitude, 3.0);
}

#[test]
fn bad_line_reports_line_number() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("track.jsonl");
    std::fs::write(&path, "{\"latitude\":1.0,\"longitude\":2.0}\n{oops}\n").unwrap();

    let err = read_all::<crate::geo::Coordinate>(&path).unwrap_err();
    match err {
        Error::CorruptedData(msg) => assert!(msg.contains(":2:"), "got {msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
