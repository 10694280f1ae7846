// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fieldwatch - location sharing and roll calls for supervised field trips.
//!
//! This crate provides the participant agent and the supervisor tools behind
//! the `fieldwatch` CLI. Everything talks to an `fw-relay` server over
//! WebSocket.
//!
//! # Main Components
//!
//! - [`sampler`] - adaptive position sampling (high accuracy vs power save)
//! - [`sync`] - relay client, position sync and the offline queue
//! - [`rollcall`] - roll-call coordinator (supervisor) and responder (participant)
//! - [`monitor`] - live position map and geofence alerts (supervisor)
//! - [`agent`] - one participant session wired together, gated on consent
//! - [`session`] - joined trip and consent records
//! - [`Config`] - `config.toml` in the state directory

mod cli;
mod commands;
mod env;

pub mod agent;
pub mod config;
pub mod error;
pub mod monitor;
pub mod rollcall;
pub mod sampler;
pub mod session;
pub mod source;
pub mod sync;

pub use cli::{Cli, Command, ConsentCommand, QueueCommand};
pub use config::Config;
pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let state_dir = cli.state_dir.as_deref();
    match cli.command {
        Command::Join { participant, trip, name } => commands::participant::join(state_dir, participant, trip, name),
        Command::Leave => commands::participant::leave(state_dir),
        Command::Consent(command) => commands::consent::run(state_dir, command),
        Command::Run { fixes, repeat, battery } => commands::run::run(state_dir, fixes, repeat, battery),
        Command::Respond => commands::respond::run(state_dir),
        Command::Monitor { trip, lat, lng, radius, participants } => {
            commands::monitor::run(state_dir, trip, lat, lng, radius, participants)
        }
        Command::RollCall { trip, supervisor, timeout } => {
            commands::roll_call::run(state_dir, trip, supervisor, timeout)
        }
        Command::Queue(command) => commands::queue::run(state_dir, command),
    }
}

/// Installs the stderr log subscriber.
///
/// `RUST_LOG` wins when set. Otherwise long-running commands log at `info`
/// and one-shot commands only report warnings.
pub fn init_logging(command: &Command) {
    let default = if command.is_long_running() { "info" } else { "warn" };
    let filter = if env::log_filter_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    } else {
        EnvFilter::new(default)
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
