// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};
use fw_core::{Coordinate, PositionFix};
use std::cell::RefCell;
use tempfile::tempdir;

fn record(seq: u32) -> BufferedPosition {
    let fix = PositionFix::new(
        Coordinate::new(41.9 + f64::from(seq) * 0.001, 12.5).unwrap(),
        Some(5.0),
        Utc.timestamp_opt(1_700_000_000 + i64::from(seq), 0).unwrap(),
    );
    BufferedPosition::from_fix("s1", "t1", &fix, Some(0.5))
}

#[test]
fn new_queue_is_empty() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    assert_eq!(queue.count().unwrap(), 0);
    assert!(queue.records().unwrap().is_empty());
}

#[test]
fn records_keep_capture_order() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    for seq in 0..3 {
        queue.append(&record(seq)).unwrap();
    }
    assert_eq!(queue.records().unwrap(), vec![record(0), record(1), record(2)]);
}

#[test]
fn survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("queue.db");
    {
        let queue = OfflineQueue::open(&path).unwrap();
        queue.append(&record(1)).unwrap();
        queue.append(&record(2)).unwrap();
    }
    let queue = OfflineQueue::open(&path).unwrap();
    assert_eq!(queue.count().unwrap(), 2);
    assert_eq!(queue.records().unwrap()[0], record(1));
}

#[tokio::test]
async fn drain_sends_everything_in_order() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    for seq in 0..3 {
        queue.append(&record(seq)).unwrap();
    }

    let sent = RefCell::new(Vec::new());
    let outcome = queue
        .drain(|r| {
            sent.borrow_mut().push(r);
            async { Ok::<(), String>(()) }
        })
        .await
        .unwrap();

    assert_eq!(outcome, DrainOutcome { sent: 3, remaining: 0 });
    assert_eq!(sent.into_inner(), vec![record(0), record(1), record(2)]);
    assert_eq!(queue.count().unwrap(), 0);
}

#[tokio::test]
async fn drain_stops_at_first_failure() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    for seq in 0..4 {
        queue.append(&record(seq)).unwrap();
    }

    let calls = RefCell::new(0);
    let outcome = queue
        .drain(|_| {
            *calls.borrow_mut() += 1;
            let ok = *calls.borrow() <= 2;
            async move {
                if ok {
                    Ok(())
                } else {
                    Err("relay went away")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(outcome, DrainOutcome { sent: 2, remaining: 2 });
    assert_eq!(*calls.borrow(), 3);
    assert_eq!(queue.records().unwrap(), vec![record(2), record(3)]);
}

#[tokio::test]
async fn empty_drain_never_calls_send() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    let calls = RefCell::new(0);
    let outcome = queue
        .drain(|_| {
            *calls.borrow_mut() += 1;
            async { Ok::<(), String>(()) }
        })
        .await
        .unwrap();
    assert_eq!(outcome, DrainOutcome::default());
    assert_eq!(*calls.borrow(), 0);
}

#[tokio::test]
async fn corrupt_rows_are_dropped() {
    let queue = OfflineQueue::open_in_memory().unwrap();
    queue.append(&record(1)).unwrap();
    queue
        .lock()
        .execute(
            "INSERT INTO buffered_positions (payload, enqueued_at) VALUES ('{not json', 'x')",
            [],
        )
        .unwrap();
    queue.append(&record(2)).unwrap();

    assert_eq!(queue.records().unwrap(), vec![record(1), record(2)]);
    assert_eq!(queue.count().unwrap(), 2);
}
