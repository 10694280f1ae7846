// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod consent;
pub mod monitor;
pub mod participant;
pub mod queue;
pub mod respond;
pub mod roll_call;
pub mod run;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::sync::{RelayClient, RelayEvent};

/// How long one-shot commands wait for the relay.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved state directory and its configuration.
pub struct Context {
    pub state_dir: PathBuf,
    pub config: Config,
}

impl Context {
    pub fn load(state_dir: Option<&Path>) -> Result<Self> {
        let state_dir = config::state_dir(state_dir)?;
        let config = Config::load_with_env(&state_dir)?;
        Ok(Context { state_dir, config })
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.state_dir.join("alerts.jsonl")
    }
}

/// Runs an async command on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let output = runtime.block_on(future);
    // A blocked stdin reader must not hold the process open
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(output)
}

/// A token cancelled on Ctrl-C.
pub fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
        }
        token.cancel();
    });
    cancel
}

/// Starts a relay client and waits until it is connected.
pub async fn connect(config: &Config) -> Result<RelayClient> {
    let client = RelayClient::spawn(config.relay.connection_config());
    let mut events = client.events();
    if !wait_connected(&client, &mut events, CONNECT_TIMEOUT).await {
        client.shutdown();
        return Err(Error::RelayUnreachable(config.relay.url.clone()));
    }
    debug!(url = %config.relay.url, "relay connected");
    Ok(client)
}

/// Waits for the client to connect. False on timeout or when the client
/// stopped.
pub async fn wait_connected(
    client: &RelayClient,
    events: &mut broadcast::Receiver<RelayEvent>,
    timeout: Duration,
) -> bool {
    let waited = tokio::time::timeout(timeout, async {
        while !client.is_connected() {
            match events.recv().await {
                Ok(RelayEvent::Connected) => break,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
        true
    })
    .await;
    waited.unwrap_or(false)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;
