// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between agents and the relay.
//!
//! The protocol is topic based:
//! - Clients subscribe to topics and publish events to them
//! - The relay fans each publish out to every other subscriber
//! - Durable writes and roll-call bookkeeping go through correlated RPCs

use serde::{Deserialize, Serialize};

use crate::model::{PositionPayload, PositionUpsert, RollCall, RollCallResponse};

/// Topic carrying position broadcasts for a trip.
pub fn trip_topic(trip_id: &str) -> String {
    format!("trip:{trip_id}")
}

/// Topic carrying roll-call traffic for a trip.
pub fn supervisor_topic(trip_id: &str) -> String {
    format!("trip_supervisor:{trip_id}")
}

/// Events delivered on a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A participant's latest position.
    Position(PositionPayload),

    /// A roll-call round has started.
    RollCallStart { roll_call_id: i64, timeout_seconds: u32 },

    /// A roll-call round has ended.
    RollCallEnd { roll_call_id: i64 },

    /// A response was recorded. Published by the relay, never by clients.
    RollCallResponse(RollCallResponse),
}

/// Remote procedure calls answered by the relay's store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RpcCall {
    /// Upsert the participant's durable position.
    UpsertPosition(PositionUpsert),

    /// Create a round, closing any round still open for the trip.
    CreateRollCall {
        trip_id: String,
        supervisor_id: String,
        timeout_seconds: u32,
    },

    /// Record a response. Duplicates are ignored.
    RecordResponse { roll_call_id: i64, participant_id: String },

    /// Mark a round closed.
    CloseRollCall { roll_call_id: i64 },

    /// Fetch the trip's open round, if any.
    OpenRollCall { trip_id: String },
}

/// Successful RPC results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RpcReply {
    /// The call succeeded and has no result.
    Ack,

    /// A round, or `None` when no round is open.
    RollCall { roll_call: Option<RollCall> },

    /// Outcome of `record_response`.
    Recorded {
        /// False when the participant had already responded.
        inserted: bool,
    },
}

/// Messages sent from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving events on a topic.
    Subscribe { topic: String },

    /// Stop receiving events on a topic.
    Unsubscribe { topic: String },

    /// Deliver an event to the topic's other subscribers.
    Publish { topic: String, event: ChannelEvent },

    /// Invoke a store operation.
    Rpc {
        /// Client-chosen ID echoed in the result.
        id: u64,
        call: RpcCall,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from relay to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed; events on `topic` follow.
    Subscribed { topic: String },

    /// An event published on a subscribed topic.
    Event { topic: String, event: ChannelEvent },

    /// Successful RPC result.
    RpcResult { id: u64, reply: RpcReply },

    /// Failed RPC.
    RpcError { id: u64, message: String },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error not tied to a request.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    pub fn subscribe(topic: impl Into<String>) -> Self {
        ClientMessage::Subscribe { topic: topic.into() }
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        ClientMessage::Unsubscribe { topic: topic.into() }
    }

    pub fn publish(topic: impl Into<String>, event: ChannelEvent) -> Self {
        ClientMessage::Publish { topic: topic.into(), event }
    }

    pub fn rpc(id: u64, call: RpcCall) -> Self {
        ClientMessage::Rpc { id, call }
    }

    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn subscribed(topic: impl Into<String>) -> Self {
        ServerMessage::Subscribed { topic: topic.into() }
    }

    pub fn event(topic: impl Into<String>, event: ChannelEvent) -> Self {
        ServerMessage::Event { topic: topic.into(), event }
    }

    pub fn rpc_result(id: u64, reply: RpcReply) -> Self {
        ServerMessage::RpcResult { id, reply }
    }

    pub fn rpc_error(id: u64, message: impl Into<String>) -> Self {
        ServerMessage::RpcError { id, message: message.into() }
    }

    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
