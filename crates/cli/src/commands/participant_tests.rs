// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;
use crate::error::Error;

#[test]
fn join_starts_session() {
    let ctx = TestContext::new();
    let (session, consented) = join_in(ctx.path(), "s1".into(), "rome".into(), Some("Ada".into())).unwrap();
    assert_eq!(session.trip_id, "rome");
    assert!(!consented);

    let store = ctx.store();
    let stored = store.session().unwrap();
    assert_eq!(stored.participant_id, "s1");
    assert_eq!(stored.display_name.as_deref(), Some("Ada"));
}

#[test]
fn rejoining_keeps_consent() {
    let ctx = TestContext::new();
    ctx.join("s1", "rome").consent("s1");
    leave_in(ctx.path()).unwrap();

    let (_, consented) = join_in(ctx.path(), "s1".into(), "florence".into(), None).unwrap();
    assert!(consented);
}

#[test]
fn join_rejects_blank_trip() {
    let ctx = TestContext::new();
    let err = join_in(ctx.path(), "s1".into(), "  ".into(), None).unwrap_err();
    assert!(matches!(err, Error::FieldEmpty { field: "trip id" }));
}

#[test]
fn leave_reports_previous_session() {
    let ctx = TestContext::new();
    assert_eq!(leave_in(ctx.path()).unwrap(), None);

    ctx.join("s1", "rome");
    assert_eq!(leave_in(ctx.path()).unwrap().unwrap().trip_id, "rome");
    assert!(ctx.store().session().is_none());
}
