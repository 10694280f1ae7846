// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! The variable name constants are generated by `build.rs` and live in the
//! [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `FIELDWATCH_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    non_empty(vars::FIELDWATCH_STATE_DIR).map(PathBuf::from)
}

/// Returns the value of `FIELDWATCH_RELAY_URL` if set.
pub fn relay_url() -> Option<String> {
    non_empty(vars::FIELDWATCH_RELAY_URL)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    non_empty(vars::XDG_STATE_HOME).map(PathBuf::from)
}

/// Returns `true` if `RUST_LOG` is set, meaning the user picked a filter.
pub fn log_filter_set() -> bool {
    std::env::var(vars::RUST_LOG).is_ok()
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
