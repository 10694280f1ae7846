// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay client.
//!
//! [`RelayClient`] is a cheap handle to a background task that owns the
//! transport. The task:
//! - connects with backoff and reconnects whenever the connection drops
//! - remembers the subscribed topics and resubscribes after a reconnect
//! - correlates RPC results with callers by request id
//! - fans relay events out to every [`RelayClient::events`] receiver
//!
//! Publishing and RPCs fail fast with [`ClientError::NotConnected`] while the
//! relay is unreachable. Nothing is buffered here; callers decide what to
//! keep for later.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::protocol::{ChannelEvent, ClientMessage, RpcCall, RpcReply, ServerMessage};

use super::connection::{connect_with_retry, ConnectionConfig, SharedConnectionState, STATE_DISCONNECTED};
use super::transport::{Transport, TransportError, WebSocketTransport};

/// How long an RPC may wait for its result.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not connected to relay")]
    NotConnected,

    #[error("relay rejected request: {0}")]
    Rpc(String),

    #[error("relay did not answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected reply from relay: {0}")]
    UnexpectedReply(String),

    #[error("relay client stopped")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// What the client task reports to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected,
    Disconnected,
    /// The relay confirmed a subscription.
    Subscribed(String),
    /// An event arrived on a subscribed topic.
    Event { topic: String, event: ChannelEvent },
}

enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Publish {
        topic: String,
        event: ChannelEvent,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Rpc {
        call: RpcCall,
        reply: oneshot::Sender<ClientResult<RpcReply>>,
    },
}

/// Handle to the relay connection task.
#[derive(Clone)]
pub struct RelayClient {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<RelayEvent>,
    state: Arc<SharedConnectionState>,
    cancel: CancellationToken,
}

impl RelayClient {
    /// Starts a client that connects over WebSocket.
    pub fn spawn(config: ConnectionConfig) -> Self {
        Self::spawn_with(config, WebSocketTransport::new)
    }

    /// Starts a client that builds each connection with `make_transport`.
    pub fn spawn_with<T, F>(config: ConnectionConfig, make_transport: F) -> Self
    where
        T: Transport + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = Arc::new(SharedConnectionState::new());
        let cancel = CancellationToken::new();

        let task = ClientTask {
            config,
            make_transport,
            commands: command_rx,
            events: events.clone(),
            state: Arc::clone(&state),
            cancel: cancel.clone(),
            topics: BTreeSet::new(),
            pending: HashMap::new(),
            next_id: 1,
        };
        tokio::spawn(task.run());

        RelayClient { commands, events, state, cancel }
    }

    /// A receiver for events from now on.
    pub fn events(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn status(&self) -> String {
        self.state.status_string()
    }

    /// Adds a topic. It stays subscribed across reconnects until removed.
    pub async fn subscribe(&self, topic: impl Into<String>) -> ClientResult<()> {
        self.command(Command::Subscribe(topic.into())).await
    }

    pub async fn unsubscribe(&self, topic: impl Into<String>) -> ClientResult<()> {
        self.command(Command::Unsubscribe(topic.into())).await
    }

    /// Publishes an event to the topic's other subscribers.
    pub async fn publish(&self, topic: impl Into<String>, event: ChannelEvent) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let (reply, rx) = oneshot::channel();
        self.command(Command::Publish { topic: topic.into(), event, reply }).await?;
        rx.await.map_err(|_| ClientError::ChannelClosed)?
    }

    /// Calls a relay store operation and waits for its reply.
    pub async fn rpc(&self, call: RpcCall) -> ClientResult<RpcReply> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let (reply, rx) = oneshot::channel();
        self.command(Command::Rpc { call, reply }).await?;
        match tokio::time::timeout(RPC_TIMEOUT, rx).await {
            Ok(result) => result.map_err(|_| ClientError::ChannelClosed)?,
            Err(_) => Err(ClientError::Timeout(RPC_TIMEOUT)),
        }
    }

    /// Stops the background task. Every clone stops working.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn command(&self, command: Command) -> ClientResult<()> {
        self.commands.send(command).await.map_err(|_| ClientError::ChannelClosed)
    }
}

struct ClientTask<F> {
    config: ConnectionConfig,
    make_transport: F,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<RelayEvent>,
    state: Arc<SharedConnectionState>,
    cancel: CancellationToken,
    topics: BTreeSet<String>,
    pending: HashMap<u64, oneshot::Sender<ClientResult<RpcReply>>>,
    next_id: u64,
}

/// Why a connected session ended.
enum SessionEnd {
    Lost,
    Stop,
}

impl<T, F> ClientTask<F>
where
    T: Transport,
    F: FnMut() -> T,
{
    async fn run(mut self) {
        while let Some(mut transport) = self.connect().await {
            let _ = self.events.send(RelayEvent::Connected);
            let end = self.session(&mut transport).await;

            self.state.set(STATE_DISCONNECTED);
            for (_, reply) in self.pending.drain() {
                let _ = reply.send(Err(ClientError::NotConnected));
            }
            let _ = self.events.send(RelayEvent::Disconnected);

            if let SessionEnd::Stop = end {
                let _ = transport.disconnect().await;
                break;
            }
            info!("relay connection lost, reconnecting");
        }
        self.state.set(STATE_DISCONNECTED);
        debug!("relay client stopped");
    }

    /// Connects while still accepting topic changes. `None` means stop.
    async fn connect(&mut self) -> Option<T> {
        let ClientTask { config, make_transport, commands, state, cancel, topics, .. } = self;
        let attempt = connect_with_retry(make_transport, config, state, cancel);
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                transport = &mut attempt => return transport,
                command = commands.recv() => match command {
                    Some(command) => offline(command, topics),
                    None => {
                        cancel.cancel();
                        return None;
                    }
                },
            }
        }
    }

    async fn session(&mut self, transport: &mut T) -> SessionEnd {
        for topic in &self.topics {
            if let Err(e) = transport.send(ClientMessage::subscribe(topic.clone())).await {
                warn!(error = %e, "resubscribe failed");
                return SessionEnd::Lost;
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Stop,
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return SessionEnd::Stop;
                    };
                    if let Err(e) = self.handle_command(transport, command).await {
                        warn!(error = %e, "relay send failed");
                        return SessionEnd::Lost;
                    }
                }
                msg = transport.recv() => match msg {
                    Ok(Some(msg)) => self.handle_message(msg),
                    Ok(None) => return SessionEnd::Lost,
                    Err(TransportError::SerializationError(e)) => {
                        warn!(error = %e, "ignoring malformed relay message");
                    }
                    Err(e) => {
                        warn!(error = %e, "relay receive failed");
                        return SessionEnd::Lost;
                    }
                },
            }
        }
    }

    async fn handle_command(&mut self, transport: &mut T, command: Command) -> Result<(), TransportError> {
        match command {
            Command::Subscribe(topic) => {
                if self.topics.insert(topic.clone()) {
                    transport.send(ClientMessage::subscribe(topic)).await?;
                }
            }
            Command::Unsubscribe(topic) => {
                if self.topics.remove(&topic) {
                    transport.send(ClientMessage::unsubscribe(topic)).await?;
                }
            }
            Command::Publish { topic, event, reply } => {
                let result = transport.send(ClientMessage::publish(topic, event)).await;
                let failed = result.as_ref().err().map(|e| e.to_string());
                let _ = reply.send(result.map_err(ClientError::from));
                if let Some(e) = failed {
                    return Err(TransportError::SendFailed(e));
                }
            }
            Command::Rpc { call, reply } => {
                let id = self.next_id;
                self.next_id += 1;
                if let Err(e) = transport.send(ClientMessage::rpc(id, call)).await {
                    let _ = reply.send(Err(ClientError::NotConnected));
                    return Err(e);
                }
                self.pending.insert(id, reply);
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Subscribed { topic } => {
                debug!(%topic, "subscribed");
                let _ = self.events.send(RelayEvent::Subscribed(topic));
            }
            ServerMessage::Event { topic, event } => {
                let _ = self.events.send(RelayEvent::Event { topic, event });
            }
            ServerMessage::RpcResult { id, reply } => {
                if let Some(tx) = self.pending.remove(&id) {
                    let _ = tx.send(Ok(reply));
                }
            }
            ServerMessage::RpcError { id, message } => {
                if let Some(tx) = self.pending.remove(&id) {
                    let _ = tx.send(Err(ClientError::Rpc(message)));
                }
            }
            ServerMessage::Pong { .. } => {}
            ServerMessage::Error { message } => warn!(%message, "relay reported an error"),
        }
    }
}

/// Applies a command that arrived while disconnected.
fn offline(command: Command, topics: &mut BTreeSet<String>) {
    match command {
        Command::Subscribe(topic) => {
            topics.insert(topic);
        }
        Command::Unsubscribe(topic) => {
            topics.remove(&topic);
        }
        Command::Publish { reply, .. } => {
            let _ = reply.send(Err(ClientError::NotConnected));
        }
        Command::Rpc { reply, .. } => {
            let _ = reply.send(Err(ClientError::NotConnected));
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
