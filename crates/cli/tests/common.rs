// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `fieldwatch` with an isolated state directory.
pub fn fw(state: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("fieldwatch");
    cmd.arg("--state-dir")
        .arg(state.path())
        .env_remove("FIELDWATCH_STATE_DIR")
        .env_remove("FIELDWATCH_RELAY_URL")
        .env_remove("RUST_LOG");
    cmd
}

/// A state directory with a joined participant.
pub fn joined(participant: &str, trip: &str) -> TempDir {
    let state = TempDir::new().unwrap();
    fw(&state)
        .args(["join", "--participant", participant, "--trip", trip])
        .assert()
        .success();
    state
}

/// Writes a short fix track and returns its path.
pub fn track(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("track.jsonl");
    std::fs::write(
        &path,
        "{\"latitude\": 41.9028, \"longitude\": 12.4964, \"accuracy_m\": 5.0}\n\
         {\"latitude\": 41.9031, \"longitude\": 12.4968}\n",
    )
    .unwrap();
    path
}
