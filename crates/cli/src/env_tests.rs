// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use std::path::PathBuf;

#[test]
fn test_vars_constants() {
    assert_eq!(vars::FIELDWATCH_STATE_DIR, "FIELDWATCH_STATE_DIR");
    assert_eq!(vars::FIELDWATCH_RELAY_URL, "FIELDWATCH_RELAY_URL");
    assert_eq!(vars::XDG_STATE_HOME, "XDG_STATE_HOME");
    assert_eq!(vars::RUST_LOG, "RUST_LOG");
}

// Each variable is touched by a single test so parallel tests do not race.

#[test]
fn test_state_dir() {
    std::env::remove_var("FIELDWATCH_STATE_DIR");
    assert_eq!(state_dir(), None);

    std::env::set_var("FIELDWATCH_STATE_DIR", "/tmp/fw-test");
    assert_eq!(state_dir(), Some(PathBuf::from("/tmp/fw-test")));

    std::env::set_var("FIELDWATCH_STATE_DIR", "  ");
    assert_eq!(state_dir(), None);
    std::env::remove_var("FIELDWATCH_STATE_DIR");
}

#[test]
fn test_relay_url() {
    std::env::remove_var("FIELDWATCH_RELAY_URL");
    assert_eq!(relay_url(), None);

    std::env::set_var("FIELDWATCH_RELAY_URL", "ws://relay.example:7890");
    assert_eq!(relay_url().as_deref(), Some("ws://relay.example:7890"));
    std::env::remove_var("FIELDWATCH_RELAY_URL");
}

#[test]
fn test_xdg_state_home() {
    std::env::remove_var("XDG_STATE_HOME");
    assert_eq!(xdg_state_home(), None);

    std::env::set_var("XDG_STATE_HOME", "/tmp/xdg-test");
    assert_eq!(xdg_state_home(), Some(PathBuf::from("/tmp/xdg-test")));
    std::env::remove_var("XDG_STATE_HOME");
}
