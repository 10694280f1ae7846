// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Capabilities the sync and roll-call logic needs from the relay.
//!
//! The logic only sees these traits, so it runs the same against the
//! [`RelayClient`] and against in-memory fakes.

use futures_util::future::BoxFuture;

use fw_core::protocol::{ChannelEvent, RpcCall, RpcReply};
use fw_core::{PositionUpsert, RollCall};

use super::client::{ClientError, ClientResult, RelayClient};

/// Publish-only access to the broadcast channels.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, topic: String, event: ChannelEvent) -> BoxFuture<'_, ClientResult<()>>;
}

/// Topic membership on the relay connection.
pub trait Subscriptions: Send + Sync {
    /// Adds a topic. It stays subscribed across reconnects.
    fn subscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>>;

    fn unsubscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>>;

    /// Connection state for display.
    fn status(&self) -> String;
}

/// Durable position storage.
pub trait PositionStore: Send + Sync {
    /// Upserts the participant's latest position. Repeating it is harmless.
    fn upsert_position(&self, position: PositionUpsert) -> BoxFuture<'_, ClientResult<()>>;
}

/// Durable roll-call storage.
pub trait RollCallStore: Send + Sync {
    /// Opens a round. The store closes any round still open for the trip.
    fn create_roll_call(
        &self,
        trip_id: String,
        supervisor_id: String,
        timeout_seconds: u32,
    ) -> BoxFuture<'_, ClientResult<RollCall>>;

    fn close_roll_call(&self, roll_call_id: i64) -> BoxFuture<'_, ClientResult<()>>;

    /// Records a response. `false` when the participant had already answered.
    fn record_response(&self, roll_call_id: i64, participant_id: String) -> BoxFuture<'_, ClientResult<bool>>;

    /// The trip's open round, if any.
    fn open_roll_call(&self, trip_id: String) -> BoxFuture<'_, ClientResult<Option<RollCall>>>;
}

fn unexpected(reply: RpcReply) -> ClientError {
    ClientError::UnexpectedReply(format!("{:?}", reply))
}

impl Broadcaster for RelayClient {
    fn publish(&self, topic: String, event: ChannelEvent) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(RelayClient::publish(self, topic, event))
    }
}

impl Subscriptions for RelayClient {
    fn subscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(RelayClient::subscribe(self, topic))
    }

    fn unsubscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(RelayClient::unsubscribe(self, topic))
    }

    fn status(&self) -> String {
        RelayClient::status(self)
    }
}

impl PositionStore for RelayClient {
    fn upsert_position(&self, position: PositionUpsert) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            match self.rpc(RpcCall::UpsertPosition(position)).await? {
                RpcReply::Ack => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }
}

impl RollCallStore for RelayClient {
    fn create_roll_call(
        &self,
        trip_id: String,
        supervisor_id: String,
        timeout_seconds: u32,
    ) -> BoxFuture<'_, ClientResult<RollCall>> {
        Box::pin(async move {
            let call = RpcCall::CreateRollCall { trip_id, supervisor_id, timeout_seconds };
            match self.rpc(call).await? {
                RpcReply::RollCall { roll_call: Some(roll_call) } => Ok(roll_call),
                other => Err(unexpected(other)),
            }
        })
    }

    fn close_roll_call(&self, roll_call_id: i64) -> BoxFuture<'_, ClientResult<()>> {
        Box::pin(async move {
            match self.rpc(RpcCall::CloseRollCall { roll_call_id }).await? {
                RpcReply::Ack => Ok(()),
                other => Err(unexpected(other)),
            }
        })
    }

    fn record_response(&self, roll_call_id: i64, participant_id: String) -> BoxFuture<'_, ClientResult<bool>> {
        Box::pin(async move {
            match self.rpc(RpcCall::RecordResponse { roll_call_id, participant_id }).await? {
                RpcReply::Recorded { inserted } => Ok(inserted),
                other => Err(unexpected(other)),
            }
        })
    }

    fn open_roll_call(&self, trip_id: String) -> BoxFuture<'_, ClientResult<Option<RollCall>>> {
        Box::pin(async move {
            match self.rpc(RpcCall::OpenRollCall { trip_id }).await? {
                RpcReply::RollCall { roll_call } => Ok(roll_call),
                other => Err(unexpected(other)),
            }
        })
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
