// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Participant side of a roll call.
//!
//! A round becomes active either from a `roll_call_start` broadcast or, for
//! participants who join late or missed the broadcast, from polling the store
//! for the trip's open round. The local countdown mirrors the round timeout.
//! Rounds this participant already answered are never prompted again.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::protocol::{supervisor_topic, ChannelEvent};
use fw_core::{seconds_remaining, ClockSource, RollCall, RollCallResponse};

use crate::sync::{ClientResult, RelayEvent, RollCallStore};

/// The round the participant is being asked to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRound {
    pub id: i64,
    /// Seconds left on the local countdown.
    pub remaining: i64,
    pub responded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespondOutcome {
    NoActiveRound,
    /// Answered before, or the store held an earlier response or a closed
    /// round. Nothing new was recorded.
    AlreadyResponded,
    Recorded(RollCallResponse),
    /// The store could not be reached. The round stays answerable.
    Failed(String),
}

/// How the active round changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundChange {
    Opened(ActiveRound),
    Cleared(i64),
}

pub struct Responder<S> {
    store: S,
    participant_id: String,
    trip_id: String,
    active: Option<ActiveRound>,
    responded: HashSet<i64>,
}

impl<S: RollCallStore> Responder<S> {
    pub fn new(store: S, participant_id: impl Into<String>, trip_id: impl Into<String>) -> Self {
        Responder {
            store,
            participant_id: participant_id.into(),
            trip_id: trip_id.into(),
            active: None,
            responded: HashSet::new(),
        }
    }

    pub fn active(&self) -> Option<ActiveRound> {
        self.active
    }

    pub fn has_responded(&self, roll_call_id: i64) -> bool {
        self.responded.contains(&roll_call_id)
    }

    /// A `roll_call_start` broadcast.
    pub fn on_start(&mut self, roll_call_id: i64, timeout_seconds: u32) -> Option<RoundChange> {
        if self.responded.contains(&roll_call_id) {
            return None;
        }
        if self.active.is_some_and(|a| a.id == roll_call_id) {
            return None;
        }
        self.activate(roll_call_id, i64::from(timeout_seconds))
    }

    /// A `roll_call_end` broadcast. Ends of other rounds are ignored.
    pub fn on_end(&mut self, roll_call_id: i64) -> Option<RoundChange> {
        match self.active {
            Some(active) if active.id == roll_call_id => self.clear(),
            _ => None,
        }
    }

    pub fn on_event(&mut self, event: &ChannelEvent) -> Option<RoundChange> {
        match *event {
            ChannelEvent::RollCallStart { roll_call_id, timeout_seconds } => self.on_start(roll_call_id, timeout_seconds),
            ChannelEvent::RollCallEnd { roll_call_id } => self.on_end(roll_call_id),
            _ => None,
        }
    }

    /// Reconciles with the store's view of the open round at `now`.
    pub fn sync_open_round(&mut self, open: Option<&RollCall>, now: DateTime<Utc>) -> Option<RoundChange> {
        let open = open
            .filter(|rc| rc.is_open())
            .map(|rc| (rc.id, seconds_remaining(rc.started_at, rc.timeout_seconds, now)))
            .filter(|&(_, remaining)| remaining > 0);

        match (open, self.active) {
            (None, Some(_)) => self.clear(),
            (None, None) => None,
            (Some((id, _)), Some(active)) if active.id == id => None,
            (Some((id, _)), _) if self.responded.contains(&id) => {
                // Answered rounds are never prompted again
                self.clear()
            }
            (Some((id, remaining)), _) => self.activate(id, remaining),
        }
    }

    /// Fetches the open round from the store and reconciles with it.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> ClientResult<Option<RoundChange>> {
        let open = self.store.open_roll_call(self.trip_id.clone()).await?;
        Ok(self.sync_open_round(open.as_ref(), now))
    }

    /// Like [`refresh`](Self::refresh), but failures only get logged.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> Option<RoundChange> {
        self.refresh(now).await.unwrap_or_else(|e| {
            debug!(error = %e, "roll call poll failed");
            None
        })
    }

    /// One countdown second. Clears the round on its last tick.
    pub fn tick(&mut self) -> Option<RoundChange> {
        let active = self.active.as_mut()?;
        if active.remaining <= 1 {
            return self.clear();
        }
        active.remaining -= 1;
        None
    }

    /// Answers the active round.
    pub async fn respond(&mut self, now: DateTime<Utc>) -> RespondOutcome {
        let Some(active) = self.active else {
            return RespondOutcome::NoActiveRound;
        };
        if active.responded || self.responded.contains(&active.id) {
            return RespondOutcome::AlreadyResponded;
        }

        match self.store.record_response(active.id, self.participant_id.clone()).await {
            Ok(inserted) => {
                self.responded.insert(active.id);
                if let Some(current) = self.active.as_mut().filter(|a| a.id == active.id) {
                    current.responded = true;
                }
                if !inserted {
                    debug!(roll_call_id = active.id, "store kept no new response");
                    return RespondOutcome::AlreadyResponded;
                }
                info!(roll_call_id = active.id, "roll call answered");
                RespondOutcome::Recorded(RollCallResponse {
                    roll_call_id: active.id,
                    participant_id: self.participant_id.clone(),
                    responded_at: now,
                })
            }
            Err(e) => {
                warn!(roll_call_id = active.id, error = %e, "roll call response failed");
                RespondOutcome::Failed(e.to_string())
            }
        }
    }

    fn activate(&mut self, id: i64, remaining: i64) -> Option<RoundChange> {
        let round = ActiveRound { id, remaining, responded: false };
        self.active = Some(round);
        Some(RoundChange::Opened(round))
    }

    fn clear(&mut self) -> Option<RoundChange> {
        self.active.take().map(|a| RoundChange::Cleared(a.id))
    }
}

/// Drives a [`Responder`]: broadcasts, the store poll, the local countdown and
/// respond requests. `on_change` sees every round change and every respond
/// outcome.
pub async fn run_responder<S, C, F>(
    responder: &mut Responder<S>,
    mut events: broadcast::Receiver<RelayEvent>,
    mut respond_requests: mpsc::Receiver<()>,
    poll_interval: Duration,
    clock: C,
    cancel: CancellationToken,
    mut on_change: F,
) where
    S: RollCallStore,
    C: ClockSource,
    F: FnMut(ResponderUpdate),
{
    let topic = supervisor_topic(&responder.trip_id);
    let second = Duration::from_secs(1);

    let mut poll = interval(poll_interval.max(Duration::from_millis(100)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut countdown = interval_at(Instant::now() + second, second);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut requests_open = true;

    loop {
        let change = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = poll.tick() => responder.poll(clock.now_utc()).await,
            _ = countdown.tick() => responder.tick(),
            event = events.recv() => match event {
                Ok(RelayEvent::Event { topic: t, event }) if t == topic => responder.on_event(&event),
                Ok(_) => None,
                Err(broadcast::error::RecvError::Lagged(_)) => None,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            request = respond_requests.recv(), if requests_open => {
                match request {
                    Some(()) => on_change(ResponderUpdate::Responded(responder.respond(clock.now_utc()).await)),
                    None => requests_open = false,
                }
                None
            }
        };
        if let Some(change) = change {
            on_change(ResponderUpdate::Round(change));
        }
    }
}

/// What [`run_responder`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderUpdate {
    Round(RoundChange),
    Responded(RespondOutcome),
}

#[cfg(test)]
#[path = "responder_tests.rs"]
mod tests;
