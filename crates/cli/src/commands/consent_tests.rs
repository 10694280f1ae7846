// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::testing::TestContext;
use crate::error::Error;

#[test]
fn requires_session() {
    let ctx = TestContext::new();
    assert!(matches!(grant_in(ctx.path()), Err(Error::NoSession)));
    assert!(matches!(status_in(ctx.path()), Err(Error::NoSession)));
}

#[test]
fn grant_then_revoke() {
    let ctx = TestContext::new();
    ctx.join("s1", "rome");
    assert_eq!(status_in(ctx.path()).unwrap().record, None);

    let granted = grant_in(ctx.path()).unwrap();
    assert_eq!(granted.participant_id, "s1");
    assert_eq!(status_in(ctx.path()).unwrap().record, granted.record);

    let (_, removed) = revoke_in(ctx.path()).unwrap();
    assert!(removed);
    assert!(!ctx.store().has_consent("s1"));

    let (_, removed) = revoke_in(ctx.path()).unwrap();
    assert!(!removed);
}

#[test]
fn consent_is_per_participant() {
    let ctx = TestContext::new();
    ctx.join("s1", "rome").consent("s1");
    ctx.join("s2", "rome");
    assert_eq!(status_in(ctx.path()).unwrap().record, None);
    assert!(ctx.store().has_consent("s1"));
}
