// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests against a real `fw-relay` server.
//!
//! # Requirements
//!
//! The `fw-relay` binary must be built and available in the same target
//! directory. Run `cargo build -p fw-relay` before running these tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use fieldwatch::sync::{
    Broadcaster, ConnectionConfig, PositionStore, RelayClient, RelayEvent, RollCallStore, Transport,
    WebSocketTransport,
};
use fw_core::protocol::{supervisor_topic, trip_topic, ChannelEvent, ClientMessage, ServerMessage};
use fw_core::{PositionPayload, PositionUpsert};

/// Skips the test when the relay binary is not available.
macro_rules! require_server {
    () => {
        match TestServer::spawn() {
            Some(server) => server,
            None => {
                eprintln!("SKIPPED: fw-relay binary not found. Run `cargo build -p fw-relay` first.");
                return;
            }
        }
    };
}

/// Returns timeout duration, longer for CI environments.
fn timeout() -> Duration {
    if std::env::var("CI").is_ok() {
        Duration::from_secs(30)
    } else {
        Duration::from_secs(5)
    }
}

/// Finds the relay binary: `FW_RELAY_BIN`, then the test's own target
/// profile directory.
fn find_relay() -> Option<PathBuf> {
    let binary_name = if cfg!(windows) { "fw-relay.exe" } else { "fw-relay" };

    if let Ok(path) = std::env::var("FW_RELAY_BIN") {
        let binary_path = PathBuf::from(path);
        if binary_path.exists() {
            return Some(binary_path);
        }
    }

    // test_exe is at target/{debug,release}/deps/transport-*
    let test_exe = std::env::current_exe().expect("cannot get current exe path");
    let profile_dir = test_exe.parent()?.parent()?;
    let binary_path = profile_dir.join(binary_name);
    binary_path.exists().then_some(binary_path)
}

/// Spawns `fw-relay` and kills it on drop.
struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    fn spawn() -> Option<Self> {
        let binary = find_relay()?;
        for _ in 0..5 {
            // Let the OS pick a free port, then hand it to the relay
            let port = match TcpListener::bind(("127.0.0.1", 0)) {
                Ok(listener) => listener.local_addr().unwrap().port(),
                Err(_) => continue,
            };
            if let Ok(server) = Self::try_spawn(&binary, port) {
                return Some(server);
            }
        }
        panic!("fw-relay binary found but failed to start server after 5 attempts");
    }

    fn try_spawn(binary: &Path, port: u16) -> Result<Self, std::io::Error> {
        let data_dir = TempDir::new()?;
        let child = Command::new(binary)
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .arg("--data")
            .arg(data_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(TestServer { child, port, _data_dir: data_dir })
    }

    fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    async fn wait_ready(&self) -> Result<(), &'static str> {
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await {
                Ok(_) => return Ok(()),
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        Err("server did not become ready")
    }

    fn client(&self) -> RelayClient {
        RelayClient::spawn(ConnectionConfig { url: self.url(), ..ConnectionConfig::default() })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Waits for the first event matching `pred`.
async fn wait_for<F>(events: &mut broadcast::Receiver<RelayEvent>, mut pred: F) -> RelayEvent
where
    F: FnMut(&RelayEvent) -> bool,
{
    tokio::time::timeout(timeout(), async {
        loop {
            let event = events.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event timed out")
}

/// Subscribes and waits for the relay to confirm.
async fn subscribe(client: &RelayClient, topic: String) {
    let mut events = client.events();
    client.subscribe(topic.clone()).await.unwrap();
    wait_for(&mut events, |e| *e == RelayEvent::Subscribed(topic.clone())).await;
}

async fn connected(server: &TestServer) -> RelayClient {
    let client = server.client();
    let mut events = client.events();
    if !client.is_connected() {
        wait_for(&mut events, |e| *e == RelayEvent::Connected).await;
    }
    client
}

#[tokio::test]
async fn test_websocket_transport_ping_pong() {
    let server = require_server!();
    server.wait_ready().await.unwrap();

    let mut transport = WebSocketTransport::new();
    transport.connect(&server.url()).await.unwrap();
    assert!(transport.is_connected());

    transport.send(ClientMessage::ping(42)).await.unwrap();
    let msg = tokio::time::timeout(timeout(), transport.recv()).await.expect("recv timed out").unwrap();
    assert!(matches!(msg, Some(ServerMessage::Pong { id: 42 })));

    transport.disconnect().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_position_fan_out_skips_sender() {
    let server = require_server!();
    server.wait_ready().await.unwrap();

    let participant = connected(&server).await;
    let supervisor = connected(&server).await;
    let topic = trip_topic("rome");
    subscribe(&participant, topic.clone()).await;
    subscribe(&supervisor, topic.clone()).await;

    let mut supervisor_events = supervisor.events();
    let mut participant_events = participant.events();
    let payload = PositionPayload {
        participant_id: "s1".into(),
        latitude: 41.9,
        longitude: 12.5,
        accuracy_m: Some(6.0),
        battery_level: Some(0.8),
    };
    Broadcaster::publish(&participant, topic.clone(), ChannelEvent::Position(payload.clone())).await.unwrap();

    let received = wait_for(&mut supervisor_events, |e| matches!(e, RelayEvent::Event { .. })).await;
    assert_eq!(received, RelayEvent::Event { topic, event: ChannelEvent::Position(payload) });

    // No echo to the publisher
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(participant_events.try_recv().is_err());
}

#[tokio::test]
async fn test_position_upsert_is_acknowledged() {
    let server = require_server!();
    server.wait_ready().await.unwrap();

    let client = connected(&server).await;
    let upsert = PositionUpsert {
        participant_id: "s1".into(),
        trip_id: "rome".into(),
        latitude: 41.9,
        longitude: 12.5,
        accuracy_m: None,
        battery_level: None,
    };
    client.upsert_position(upsert.clone()).await.unwrap();
    // Upserts are idempotent
    client.upsert_position(upsert).await.unwrap();
}

#[tokio::test]
async fn test_roll_call_round_trip() {
    let server = require_server!();
    server.wait_ready().await.unwrap();

    let supervisor = connected(&server).await;
    let participant = connected(&server).await;
    let topic = supervisor_topic("rome");
    subscribe(&supervisor, topic.clone()).await;
    subscribe(&participant, topic.clone()).await;

    let round = supervisor.create_roll_call("rome".into(), "sup".into(), 60).await.unwrap();
    assert_eq!(round.timeout_seconds, 60);
    assert!(round.is_open());

    // A late joiner finds the round by polling
    let open = participant.open_roll_call("rome".into()).await.unwrap().unwrap();
    assert_eq!(open.id, round.id);

    let mut supervisor_events = supervisor.events();
    assert!(participant.record_response(round.id, "s1".into()).await.unwrap());
    assert!(!participant.record_response(round.id, "s1".into()).await.unwrap());

    let pushed = wait_for(&mut supervisor_events, |e| {
        matches!(e, RelayEvent::Event { event: ChannelEvent::RollCallResponse(_), .. })
    })
    .await;
    match pushed {
        RelayEvent::Event { event: ChannelEvent::RollCallResponse(response), .. } => {
            assert_eq!(response.roll_call_id, round.id);
            assert_eq!(response.participant_id, "s1");
        }
        other => panic!("unexpected event {other:?}"),
    }

    supervisor.close_roll_call(round.id).await.unwrap();
    assert!(participant.open_roll_call("rome".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_round_closes_previous() {
    let server = require_server!();
    server.wait_ready().await.unwrap();

    let client = connected(&server).await;
    let first = client.create_roll_call("rome".into(), "sup".into(), 60).await.unwrap();
    let second = client.create_roll_call("rome".into(), "sup".into(), 30).await.unwrap();
    assert_ne!(first.id, second.id);

    let open = client.open_roll_call("rome".into()).await.unwrap().unwrap();
    assert_eq!(open.id, second.id);
    // Other trips are unaffected
    assert!(client.open_roll_call("florence".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_websocket_transport_connection_refused() {
    let port = TcpListener::bind(("127.0.0.1", 0)).unwrap().local_addr().unwrap().port();
    let mut transport = WebSocketTransport::new();
    assert!(transport.connect(&format!("ws://127.0.0.1:{port}")).await.is_err());
    assert!(!transport.is_connected());
}
