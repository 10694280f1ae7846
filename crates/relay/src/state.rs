// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Wraps the durable store and the topic fan-out channel for shared access
//! across connections.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use fw_core::protocol::supervisor_topic;
use fw_core::{ChannelEvent, RpcCall, RpcReply};

use crate::store::{Result, Store};

const DB_FILE_NAME: &str = "relay.db";

/// An event fanned out to every connection subscribed to `topic`.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub topic: String,
    pub event: ChannelEvent,
    /// Publishing connection, which does not receive its own event.
    pub origin: Option<u64>,
}

/// Shared server state containing the store and the fan-out channel.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    store: Mutex<Store>,
    broadcast_tx: broadcast::Sender<Broadcast>,
    next_connection: AtomicU64,
}

impl ServerState {
    /// Opens `relay.db` in the given directory.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let store = Store::open(&data_dir.join(DB_FILE_NAME))?;
        let (broadcast_tx, _) = broadcast::channel(1024);

        Ok(ServerState {
            inner: Arc::new(ServerStateInner {
                store: Mutex::new(store),
                broadcast_tx,
                next_connection: AtomicU64::new(1),
            }),
        })
    }

    /// Allocates an ID for a new connection.
    pub fn connection_id(&self) -> u64 {
        self.inner.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Fans an event out to the topic's subscribers.
    pub fn publish(&self, topic: String, event: ChannelEvent, origin: Option<u64>) {
        // No receivers is fine
        let _ = self.inner.broadcast_tx.send(Broadcast { topic, event, origin });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Answers an RPC against the store.
    ///
    /// A newly recorded response is pushed to the trip's supervisor topic.
    pub async fn dispatch(&self, call: RpcCall) -> Result<RpcReply> {
        let now = Utc::now();
        let mut store = self.inner.store.lock().await;

        match call {
            RpcCall::UpsertPosition(position) => {
                store.upsert_position(&position, now)?;
                Ok(RpcReply::Ack)
            }

            RpcCall::CreateRollCall { trip_id, supervisor_id, timeout_seconds } => {
                let round = store.create_roll_call(&trip_id, &supervisor_id, timeout_seconds, now)?;
                debug!(id = round.id, %trip_id, timeout_seconds, "roll call created");
                Ok(RpcReply::RollCall { roll_call: Some(round) })
            }

            RpcCall::RecordResponse { roll_call_id, participant_id } => {
                let Some(response) = store.record_response(roll_call_id, &participant_id, now)? else {
                    debug!(roll_call_id, %participant_id, "duplicate or late response ignored");
                    return Ok(RpcReply::Recorded { inserted: false });
                };
                let trip_id = store.roll_call_trip(roll_call_id)?.unwrap_or_default();
                debug!(roll_call_id, %participant_id, responses = store.response_count(roll_call_id)?, "response recorded");
                drop(store);

                self.publish(supervisor_topic(&trip_id), ChannelEvent::RollCallResponse(response), None);
                Ok(RpcReply::Recorded { inserted: true })
            }

            RpcCall::CloseRollCall { roll_call_id } => {
                store.close_roll_call(roll_call_id, now)?;
                debug!(roll_call_id, "roll call closed");
                Ok(RpcReply::Ack)
            }

            RpcCall::OpenRollCall { trip_id } => {
                let roll_call = store.open_roll_call(&trip_id)?;
                Ok(RpcReply::RollCall { roll_call })
            }
        }
    }
}
