// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Relay connectivity and position sync.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Sampler   │────►│ SyncManager │────►│ RelayClient │────►│  fw-relay   │
//! └─────────────┘     └─────────────┘     │  (task)     │◄────│             │
//!                            │            └─────────────┘     └─────────────┘
//!                            ▼                   │
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │OfflineQueue │     │  Transport  │
//!                     │  (SQLite)   │     │   (trait)   │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! - [`RelayClient`]: reconnecting WebSocket client with topic subscriptions
//!   and request/response RPCs
//! - [`Broadcaster`], [`Subscriptions`], [`PositionStore`], [`RollCallStore`]:
//!   what the rest of the crate needs from the relay
//! - [`SyncManager`]: publish, rate-limited durable writes, offline fallback
//! - [`OfflineQueue`]: durable FIFO drained on reconnect

mod channel;
mod client;
mod connection;
mod manager;
mod queue;
mod transport;

pub use channel::{Broadcaster, PositionStore, RollCallStore, Subscriptions};
pub use client::{ClientError, ClientResult, RelayClient, RelayEvent, RPC_TIMEOUT};
pub use connection::{ConnectionConfig, SharedConnectionState};
pub use manager::SyncManager;
pub use queue::{DrainOutcome, OfflineQueue, QueueError, QueueResult};
pub use transport::{Transport, TransportError, TransportResult, WebSocketTransport};

#[cfg(test)]
pub(crate) mod test_helpers;
