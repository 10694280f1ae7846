// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory network for sync tests.
//!
//! `MockNetwork::transport` hands out transports that connect only while the
//! network is online. Every accepted connection shows up as a [`MockPeer`]
//! on the receiver returned by [`MockNetwork::new`]; the test plays the relay
//! through it. Dropping a peer closes that connection.
//!
//! [`FakeRelay`] stands in for the relay behind the channel traits.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use fw_core::protocol::{ChannelEvent, ClientMessage, ServerMessage};
use fw_core::{PositionUpsert, RollCall};

use super::channel::{Broadcaster, PositionStore, RollCallStore, Subscriptions};
use super::client::{ClientError, ClientResult};
use super::transport::{Transport, TransportError, TransportFuture};

#[derive(Clone)]
pub struct MockNetwork {
    online: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

impl MockNetwork {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let net = MockNetwork {
            online: Arc::new(AtomicBool::new(true)),
            attempts: Arc::new(AtomicU32::new(0)),
            accepted,
        };
        (net, rx)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Connection attempts made so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport { net: self.clone(), conn: None }
    }
}

/// Relay side of one mock connection.
pub struct MockPeer {
    from_client: mpsc::UnboundedReceiver<ClientMessage>,
    to_client: mpsc::UnboundedSender<ServerMessage>,
}

impl MockPeer {
    /// Next message from the client, or `None` once it disconnected.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        tokio::time::timeout(Duration::from_secs(30), self.from_client.recv())
            .await
            .unwrap()
    }

    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.from_client.try_recv().ok()
    }

    pub fn send(&self, msg: ServerMessage) {
        let _ = self.to_client.send(msg);
    }

    /// Answers the next Subscribe like the relay would. Returns the topic.
    pub async fn accept_subscribe(&mut self) -> String {
        match self.recv().await {
            Some(ClientMessage::Subscribe { topic }) => {
                self.send(ServerMessage::subscribed(topic.clone()));
                topic
            }
            other => panic!("expected subscribe, got {other:?}"),
        }
    }
}

pub struct MockTransport {
    net: MockNetwork,
    conn: Option<(mpsc::UnboundedSender<ClientMessage>, mpsc::UnboundedReceiver<ServerMessage>)>,
}

impl Transport for MockTransport {
    fn connect(&mut self, _url: &str) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.net.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.net.online.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionFailed("network offline".into()));
            }
            let (client_tx, from_client) = mpsc::unbounded_channel();
            let (to_client, client_rx) = mpsc::unbounded_channel();
            self.net
                .accepted
                .send(MockPeer { from_client, to_client })
                .map_err(|_| TransportError::ConnectionFailed("nobody listening".into()))?;
            self.conn = Some((client_tx, client_rx));
            Ok(())
        })
    }

    fn disconnect(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.conn = None;
            Ok(())
        })
    }

    fn send(&mut self, msg: ClientMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let (tx, _) = self.conn.as_ref().ok_or(TransportError::ConnectionClosed)?;
            if tx.send(msg).is_err() {
                self.conn = None;
                return Err(TransportError::SendFailed("peer gone".into()));
            }
            Ok(())
        })
    }

    fn recv(&mut self) -> TransportFuture<'_, Option<ServerMessage>> {
        Box::pin(async move {
            let (_, rx) = self.conn.as_mut().ok_or(TransportError::ConnectionClosed)?;
            let msg = rx.recv().await;
            if msg.is_none() {
                self.conn = None;
            }
            Ok(msg)
        })
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

/// In-memory relay for logic that only needs the channel traits.
///
/// Records everything it is asked to do. `set_failing(true)` makes every
/// call fail with `NotConnected`.
#[derive(Default)]
pub struct FakeRelay {
    inner: std::sync::Mutex<FakeRelayState>,
}

#[derive(Default)]
pub struct FakeRelayState {
    pub failing: bool,
    pub published: Vec<(String, ChannelEvent)>,
    pub topics: Vec<String>,
    pub upserts: Vec<PositionUpsert>,
    pub rounds: Vec<RollCall>,
    pub responses: Vec<(i64, String)>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    pub fn published(&self) -> Vec<(String, ChannelEvent)> {
        self.inner.lock().unwrap().published.clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.inner.lock().unwrap().topics.clone()
    }

    pub fn upserts(&self) -> Vec<PositionUpsert> {
        self.inner.lock().unwrap().upserts.clone()
    }

    pub fn rounds(&self) -> Vec<RollCall> {
        self.inner.lock().unwrap().rounds.clone()
    }

    pub fn responses(&self) -> Vec<(i64, String)> {
        self.inner.lock().unwrap().responses.clone()
    }

    /// Opens a round directly, as another supervisor would.
    pub fn insert_round(&self, round: RollCall) {
        self.inner.lock().unwrap().rounds.push(round);
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeRelayState) -> T) -> ClientResult<T> {
        let mut state = self.inner.lock().unwrap();
        if state.failing {
            return Err(ClientError::NotConnected);
        }
        Ok(f(&mut state))
    }
}

impl Broadcaster for FakeRelay {
    fn publish(&self, topic: String, event: ChannelEvent) -> BoxFuture<'_, ClientResult<()>> {
        let result = self.with(|s| s.published.push((topic, event)));
        Box::pin(async move { result })
    }
}

impl Subscriptions for FakeRelay {
    fn subscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>> {
        let result = self.with(|s| {
            if !s.topics.contains(&topic) {
                s.topics.push(topic);
            }
        });
        Box::pin(async move { result })
    }

    fn unsubscribe(&self, topic: String) -> BoxFuture<'_, ClientResult<()>> {
        let result = self.with(|s| s.topics.retain(|t| *t != topic));
        Box::pin(async move { result })
    }

    fn status(&self) -> String {
        let status = if self.inner.lock().unwrap().failing { "disconnected" } else { "connected" };
        status.to_string()
    }
}

impl PositionStore for FakeRelay {
    fn upsert_position(&self, position: PositionUpsert) -> BoxFuture<'_, ClientResult<()>> {
        let result = self.with(|s| s.upserts.push(position));
        Box::pin(async move { result })
    }
}

impl RollCallStore for FakeRelay {
    fn create_roll_call(
        &self,
        trip_id: String,
        _supervisor_id: String,
        timeout_seconds: u32,
    ) -> BoxFuture<'_, ClientResult<RollCall>> {
        let result = self.with(|s| {
            let now = Utc::now();
            for round in s.rounds.iter_mut().filter(|r| r.trip_id == trip_id && r.is_open()) {
                round.closed_at = Some(now);
            }
            let round = RollCall {
                id: s.rounds.len() as i64 + 1,
                trip_id,
                started_at: now,
                timeout_seconds,
                closed_at: None,
            };
            s.rounds.push(round.clone());
            round
        });
        Box::pin(async move { result })
    }

    fn close_roll_call(&self, roll_call_id: i64) -> BoxFuture<'_, ClientResult<()>> {
        let result = self.with(|s| {
            let now = Utc::now();
            for round in s.rounds.iter_mut().filter(|r| r.id == roll_call_id && r.is_open()) {
                round.closed_at = Some(now);
            }
        });
        Box::pin(async move { result })
    }

    fn record_response(&self, roll_call_id: i64, participant_id: String) -> BoxFuture<'_, ClientResult<bool>> {
        let result = self.with(|s| {
            let closed = s.rounds.iter().any(|r| r.id == roll_call_id && !r.is_open());
            let key = (roll_call_id, participant_id);
            if closed || s.responses.contains(&key) {
                return false;
            }
            s.responses.push(key);
            true
        });
        Box::pin(async move { result })
    }

    fn open_roll_call(&self, trip_id: String) -> BoxFuture<'_, ClientResult<Option<RollCall>>> {
        let result = self.with(|s| {
            s.rounds
                .iter()
                .rev()
                .find(|r| r.trip_id == trip_id && r.is_open())
                .cloned()
        });
        Box::pin(async move { result })
    }
}
