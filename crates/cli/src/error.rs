// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::{ClientError, QueueError};

/// All possible errors surfaced by the fieldwatch library and CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no active session\n  hint: run 'fieldwatch join --participant ID --trip ID' first")]
    NoSession,

    #[error("location sharing is not enabled for participant {0}\n  hint: run 'fieldwatch consent grant' first")]
    ConsentRequired(String),

    #[error("invalid battery source '{0}'\n  hint: use none, sysfs, or fixed:LEVEL[:charging]")]
    InvalidBatterySpec(String),

    #[error("no battery found under {0}\n  hint: use --battery none on machines without one")]
    BatteryNotFound(String),

    #[error("invalid participant '{0}'\n  hint: participants are given as ID=NAME")]
    InvalidParticipant(String),

    #[error("unknown command '{0}'\n  hint: dismiss ID, radius KM, at LAT LNG, alerts, status, trip ID")]
    InvalidCommand(String),

    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("fix track is empty: {0}")]
    EmptyTrack(String),

    #[error("relay at {0} is unreachable\n  hint: check [relay] url in config.toml or FIELDWATCH_RELAY_URL")]
    RelayUnreachable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("session file error: {0}")]
    Session(String),

    #[error("{0}")]
    Core(#[from] fw_core::Error),

    #[error("offline queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("relay error: {0}")]
    Client(#[from] ClientError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for fieldwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
