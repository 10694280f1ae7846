// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Participant agent.
//!
//! Wires one participant session together: the adaptive sampler feeds the
//! sync manager, and the roll-call responder listens on the supervisor
//! topic. Nothing starts without a recorded consent, and the consent is
//! re-read periodically so revoking it from another process stops sharing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::protocol::{supervisor_topic, trip_topic};
use fw_core::SystemClock;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rollcall::{run_responder, Responder, ResponderUpdate};
use crate::sampler::run_sampler;
use crate::session::{Session, SessionStore};
use crate::source::{BatterySource, PositionSource};
use crate::sync::{OfflineQueue, RelayClient, SyncManager};

const QUEUE_FILE_NAME: &str = "queue.db";
const CONSENT_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// Why the agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentExit {
    Cancelled,
    ConsentRevoked,
}

pub fn queue_path(state_dir: &Path) -> PathBuf {
    state_dir.join(QUEUE_FILE_NAME)
}

/// A participant session ready to run.
pub struct Agent<P> {
    state_dir: PathBuf,
    config: Config,
    session: Session,
    source: P,
    battery: Box<dyn BatterySource>,
}

impl<P: PositionSource + 'static> Agent<P> {
    /// Loads the session and checks consent.
    pub fn new(state_dir: &Path, config: Config, source: P, battery: Box<dyn BatterySource>) -> Result<Self> {
        let store = SessionStore::open(state_dir)?;
        let session = store.require_session()?.clone();
        if !store.has_consent(&session.participant_id) {
            return Err(Error::ConsentRequired(session.participant_id));
        }
        Ok(Agent { state_dir: state_dir.to_path_buf(), config, session, source, battery })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs until `cancel` fires or consent is revoked.
    ///
    /// Each `()` on `respond_requests` answers the active roll call.
    /// `on_update` sees round changes and respond outcomes.
    pub async fn run<F>(
        self,
        client: RelayClient,
        respond_requests: mpsc::Receiver<()>,
        cancel: CancellationToken,
        on_update: F,
    ) -> Result<AgentExit>
    where
        F: FnMut(ResponderUpdate) + Send + 'static,
    {
        let Agent { state_dir, config, session, source, battery } = self;
        let participant_id = session.participant_id.clone();
        let trip_id = session.trip_id.clone();

        let queue = OfflineQueue::open(&queue_path(&state_dir))?;
        let manager = Arc::new(SyncManager::new(
            client.clone(),
            queue,
            participant_id.clone(),
            trip_id.clone(),
            config.sync.persist_interval(),
        ));

        // Receivers first, so no subscription confirmation is missed
        let sync_events = client.events();
        let roll_call_events = client.events();
        client.subscribe(trip_topic(&trip_id)).await?;
        client.subscribe(supervisor_topic(&trip_id)).await?;
        info!(%participant_id, %trip_id, relay = %config.relay.url, "agent started");

        let stop = cancel.child_token();
        let mut tasks = JoinSet::new();
        let (sample_tx, sample_rx) = mpsc::channel(64);

        let settings = config.sampler.settings();
        let sampler_stop = stop.clone();
        tasks.spawn(async move {
            run_sampler(&source, &*battery, settings, sample_tx, sampler_stop).await;
        });

        let sync_stop = stop.clone();
        let connected = client.is_connected();
        let sync = Arc::clone(&manager);
        tasks.spawn(async move {
            sync.run(sample_rx, sync_events, connected, sync_stop).await;
        });

        let responder_stop = stop.clone();
        let poll_interval = config.roll_call.poll_interval();
        let responder_client = client.clone();
        tasks.spawn(async move {
            let mut responder = Responder::new(responder_client, participant_id, trip_id);
            run_responder(
                &mut responder,
                roll_call_events,
                respond_requests,
                poll_interval,
                SystemClock,
                responder_stop,
                on_update,
            )
            .await;
        });

        let exit = watch_consent(&state_dir, &session.participant_id, &cancel).await;
        stop.cancel();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "agent task failed");
            }
        }
        client.shutdown();

        let buffered = *manager.buffered().borrow();
        info!(?exit, buffered, "agent stopped");
        Ok(exit)
    }
}

async fn watch_consent(state_dir: &Path, participant_id: &str, cancel: &CancellationToken) -> AgentExit {
    let mut store = match SessionStore::open(state_dir) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, "cannot watch consent");
            None
        }
    };
    let mut check = tokio::time::interval(CONSENT_CHECK_INTERVAL);
    check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return AgentExit::Cancelled,
            _ = check.tick() => {}
        }
        let Some(store) = store.as_mut() else {
            continue;
        };
        match store.reload() {
            Ok(()) if !store.has_consent(participant_id) => {
                info!(%participant_id, "consent revoked");
                return AgentExit::ConsentRevoked;
            }
            Ok(()) => {}
            // A half-written file is retried on the next check
            Err(e) => debug!(error = %e, "consent check failed"),
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
