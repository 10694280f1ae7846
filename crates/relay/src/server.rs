// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Handles client connections, message routing, and per-topic fan-out.
//! Every connection sees the shared broadcast channel and keeps the events
//! for topics it subscribed to, minus the ones it published itself.

use std::collections::HashSet;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use fw_core::protocol::{ChannelEvent, ClientMessage, ServerMessage};

use crate::state::ServerState;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Per-connection routing state.
pub(crate) struct Connection {
    pub id: u64,
    pub topics: HashSet<String>,
}

impl Connection {
    fn wants(&self, topic: &str, origin: Option<u64>) -> bool {
        origin != Some(self.id) && self.topics.contains(topic)
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let mut conn = Connection { id: state.connection_id(), topics: HashSet::new() };
    info!("New WebSocket connection {} from: {}", conn.id, peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut broadcast_rx = state.subscribe();

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = match handle_client_message(&text, &state, &mut conn).await {
                            Ok(response) => response,
                            Err(e) => Some(ServerMessage::error(e.to_string())),
                        };
                        if let Some(response) = response {
                            ws_sink.send(Message::Text(response.to_json()?.into())).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", peer_addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sink.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong and raw frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", peer_addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} stream ended", peer_addr);
                        break;
                    }
                }
            }

            broadcast = broadcast_rx.recv() => {
                match broadcast {
                    Ok(b) if conn.wants(&b.topic, b.origin) => {
                        let json = ServerMessage::event(b.topic, b.event).to_json()?;
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("Failed to send event to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", peer_addr, n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    info!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client message and return an optional response.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
    conn: &mut Connection,
) -> Result<Option<ServerMessage>, Box<dyn std::error::Error + Send + Sync>> {
    let msg = ClientMessage::from_json(text)?;
    debug!("Received message from {}: {:?}", conn.id, msg);

    match msg {
        ClientMessage::Subscribe { topic } => {
            conn.topics.insert(topic.clone());
            Ok(Some(ServerMessage::subscribed(topic)))
        }

        ClientMessage::Unsubscribe { topic } => {
            conn.topics.remove(&topic);
            Ok(None)
        }

        ClientMessage::Publish { event: ChannelEvent::RollCallResponse(_), .. } => {
            Ok(Some(ServerMessage::error("roll call responses are recorded with record_response")))
        }

        ClientMessage::Publish { topic, event } => {
            state.publish(topic, event, Some(conn.id));
            Ok(None)
        }

        ClientMessage::Rpc { id, call } => match state.dispatch(call).await {
            Ok(reply) => Ok(Some(ServerMessage::rpc_result(id, reply))),
            Err(e) => {
                warn!("RPC {} from {} failed: {}", id, conn.id, e);
                Ok(Some(ServerMessage::rpc_error(id, e.to_string())))
            }
        },

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            Ok(Some(ServerMessage::pong(id)))
        }
    }
}
