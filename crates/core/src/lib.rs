// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fw-core: Shared library for the fieldwatch safety monitor
//!
//! This crate provides the data model, wire protocol, distance math and the
//! geofence alert engine used by both the fieldwatch CLI and the fw-relay
//! server.

pub mod alerts;
pub mod clock;
pub mod error;
pub mod geo;
pub mod jsonl;
pub mod model;
pub mod positions;
pub mod protocol;

pub use alerts::{ActiveAlert, AlertEngine, AlertLogEntry};
pub use clock::{seconds_remaining, ClockSource, SystemClock};
pub use error::{Error, Result};
pub use geo::{distance_km, distance_m, Coordinate};
pub use model::{
    BatteryStatus, BufferedPosition, Participant, PositionFix, PositionPayload, PositionUpsert,
    RollCall, RollCallResponse,
};
pub use positions::{LivePositionEntry, LivePositions};
pub use protocol::{
    supervisor_topic, trip_topic, ChannelEvent, ClientMessage, RpcCall, RpcReply, ServerMessage,
};
