// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor side of a roll call.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::protocol::{supervisor_topic, ChannelEvent};
use fw_core::{RollCall, RollCallResponse};

use crate::sync::{Broadcaster, ClientResult, RelayEvent, RollCallStore};

/// The round currently open on this coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRound {
    pub roll_call: RollCall,
    /// Countdown ticks left.
    pub remaining: u32,
    /// Responses by participant.
    pub responses: BTreeMap<String, RollCallResponse>,
}

/// Runs roll-call rounds for one trip. At most one round is open at a time.
pub struct Coordinator<S> {
    store: S,
    trip_id: String,
    supervisor_id: String,
    topic: String,
    round: Option<OpenRound>,
}

impl<S> Coordinator<S>
where
    S: Broadcaster + RollCallStore,
{
    pub fn new(store: S, trip_id: impl Into<String>, supervisor_id: impl Into<String>) -> Self {
        let trip_id = trip_id.into();
        Coordinator {
            store,
            topic: supervisor_topic(&trip_id),
            trip_id,
            supervisor_id: supervisor_id.into(),
            round: None,
        }
    }

    pub fn round(&self) -> Option<&OpenRound> {
        self.round.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.round.is_some()
    }

    /// Opens a new round, closing the current one first.
    pub async fn start(&mut self, timeout_seconds: u32) -> ClientResult<RollCall> {
        self.close().await;

        let roll_call = self
            .store
            .create_roll_call(self.trip_id.clone(), self.supervisor_id.clone(), timeout_seconds)
            .await?;
        info!(roll_call_id = roll_call.id, timeout_seconds, "roll call started");

        self.round = Some(OpenRound {
            roll_call: roll_call.clone(),
            remaining: timeout_seconds,
            responses: BTreeMap::new(),
        });

        let event = ChannelEvent::RollCallStart { roll_call_id: roll_call.id, timeout_seconds };
        if let Err(e) = self.store.publish(self.topic.clone(), event).await {
            warn!(error = %e, "roll call start broadcast failed");
        }
        Ok(roll_call)
    }

    /// Closes the open round. Returns it, or `None` when idle.
    pub async fn close(&mut self) -> Option<OpenRound> {
        let round = self.round.take()?;
        let id = round.roll_call.id;

        if let Err(e) = self.store.close_roll_call(id).await {
            warn!(roll_call_id = id, error = %e, "closing roll call in store failed");
        }
        if let Err(e) = self.store.publish(self.topic.clone(), ChannelEvent::RollCallEnd { roll_call_id: id }).await {
            warn!(roll_call_id = id, error = %e, "roll call end broadcast failed");
        }
        info!(roll_call_id = id, responses = round.responses.len(), "roll call closed");
        Some(round)
    }

    /// One countdown second. Closes the round on its last tick.
    pub async fn tick(&mut self) -> Option<OpenRound> {
        let round = self.round.as_mut()?;
        if round.remaining <= 1 {
            return self.close().await;
        }
        round.remaining -= 1;
        None
    }

    /// Records a pushed response. Only responses to the open round count,
    /// and each participant counts once.
    pub fn on_response(&mut self, response: &RollCallResponse) -> bool {
        let Some(round) = self.round.as_mut() else {
            return false;
        };
        if round.roll_call.id != response.roll_call_id
            || round.responses.contains_key(&response.participant_id)
        {
            debug!(roll_call_id = response.roll_call_id, "ignoring response");
            return false;
        }
        round
            .responses
            .insert(response.participant_id.clone(), response.clone());
        true
    }
}

/// Runs one round to completion: starts it, ticks the countdown every second
/// and feeds pushed responses to `on_response`. Cancelling closes the round
/// early.
pub async fn run_round<S, F>(
    coordinator: &mut Coordinator<S>,
    timeout_seconds: u32,
    mut events: broadcast::Receiver<RelayEvent>,
    cancel: CancellationToken,
    mut on_response: F,
) -> ClientResult<Option<OpenRound>>
where
    S: Broadcaster + RollCallStore,
    F: FnMut(&RollCallResponse),
{
    coordinator.start(timeout_seconds).await?;
    let topic = coordinator.topic.clone();

    let second = Duration::from_secs(1);
    let mut countdown = interval_at(Instant::now() + second, second);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(coordinator.close().await),
            _ = countdown.tick() => {
                if let Some(round) = coordinator.tick().await {
                    return Ok(Some(round));
                }
            }
            event = events.recv() => match event {
                Ok(RelayEvent::Event { topic: t, event: ChannelEvent::RollCallResponse(response) }) if t == topic => {
                    if coordinator.on_response(&response) {
                        on_response(&response);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "relay events lagged"),
                Err(broadcast::error::RecvError::Closed) => return Ok(coordinator.close().await),
            },
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
