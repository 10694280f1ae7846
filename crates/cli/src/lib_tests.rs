// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

//! Tests for the public `run()` function routing.
//!
//! Commands that need a relay are covered by the integration tests.

use super::*;
use clap::Parser;
use tempfile::TempDir;

fn run_args(dir: &TempDir, args: &[&str]) -> Result<()> {
    let state_dir = dir.path().to_str().unwrap();
    let argv = ["fieldwatch", "--state-dir", state_dir].into_iter().chain(args.iter().copied());
    run(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn participant_flow_routes_to_session_store() {
    let dir = TempDir::new().unwrap();
    run_args(&dir, &["join", "--participant", "s1", "--trip", "rome"]).unwrap();
    run_args(&dir, &["consent", "grant"]).unwrap();
    run_args(&dir, &["consent", "status"]).unwrap();
    run_args(&dir, &["queue", "status"]).unwrap();

    let store = session::SessionStore::open(dir.path()).unwrap();
    assert!(store.has_consent("s1"));

    run_args(&dir, &["consent", "revoke"]).unwrap();
    run_args(&dir, &["leave"]).unwrap();
    let store = session::SessionStore::open(dir.path()).unwrap();
    assert!(store.session().is_none());
    assert!(!store.has_consent("s1"));
}

#[test]
fn consent_without_session_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(run_args(&dir, &["consent", "grant"]), Err(Error::NoSession)));
}

#[test]
fn run_without_consent_fails() {
    let dir = TempDir::new().unwrap();
    let track = dir.path().join("track.jsonl");
    std::fs::write(&track, "{\"latitude\": 41.9, \"longitude\": 12.5}\n").unwrap();
    run_args(&dir, &["join", "--participant", "s1", "--trip", "rome"]).unwrap();

    let err = run_args(&dir, &["run", "--fixes", track.to_str().unwrap()]).unwrap_err();
    assert!(matches!(err, Error::ConsentRequired(id) if id == "s1"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[relay]\nurl = \"http://nope\"\n").unwrap();
    assert!(matches!(run_args(&dir, &["queue", "status"]), Err(Error::Config(_))));
}
