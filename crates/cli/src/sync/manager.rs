// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Position sync for one participant.
//!
//! Every fix is published on the trip topic right away when the channel is
//! subscribed, or parked in a single pending slot until it is. Durable writes
//! are rate-limited to one per persist interval and go to the relay store
//! while connected, or to the [`OfflineQueue`] otherwise. A failed durable
//! write also lands in the queue. Reconnecting drains the queue once.
//!
//! Fix arrival, connectivity changes and the persist timer all go through one
//! async mutex around [`SyncState`]. Decisions are taken under the lock and
//! network I/O happens after it is released.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fw_core::protocol::{trip_topic, ChannelEvent};
use fw_core::{BufferedPosition, PositionFix, PositionPayload, PositionUpsert};

use super::channel::{Broadcaster, PositionStore};
use super::client::RelayEvent;
use super::queue::{DrainOutcome, OfflineQueue};
use crate::sampler::SamplerEvent;

#[derive(Debug, Default)]
struct SyncState {
    connected: bool,
    subscribed: bool,
    /// Latest payload not yet published, tagged with its fix sequence number.
    pending: Option<(u64, PositionPayload)>,
    seq: u64,
    last_persisted: Option<Instant>,
    latest: Option<BufferedPosition>,
    latest_persisted: bool,
    draining: bool,
}

impl SyncState {
    fn persist_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_persisted
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    /// Claims the durable write slot for the latest record if one is due.
    fn claim_persist(&mut self, now: Instant, interval: Duration) -> Option<BufferedPosition> {
        if self.latest_persisted || !self.persist_due(now, interval) {
            return None;
        }
        let record = self.latest.clone()?;
        self.last_persisted = Some(now);
        self.latest_persisted = true;
        Some(record)
    }
}

pub struct SyncManager<R> {
    relay: R,
    queue: OfflineQueue,
    participant_id: String,
    topic: String,
    trip_id: String,
    persist_interval: Duration,
    state: Mutex<SyncState>,
    buffered: watch::Sender<usize>,
}

impl<R> SyncManager<R>
where
    R: Broadcaster + PositionStore,
{
    pub fn new(
        relay: R,
        queue: OfflineQueue,
        participant_id: impl Into<String>,
        trip_id: impl Into<String>,
        persist_interval: Duration,
    ) -> Self {
        let trip_id = trip_id.into();
        let count = queue.count().unwrap_or_else(|e| {
            warn!(error = %e, "could not count offline queue");
            0
        });
        let (buffered, _) = watch::channel(count);
        SyncManager {
            relay,
            queue,
            participant_id: participant_id.into(),
            topic: trip_topic(&trip_id),
            trip_id,
            persist_interval,
            state: Mutex::new(SyncState::default()),
            buffered,
        }
    }

    /// Number of records waiting in the offline queue.
    pub fn buffered(&self) -> watch::Receiver<usize> {
        self.buffered.subscribe()
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub async fn has_pending(&self) -> bool {
        self.state.lock().await.pending.is_some()
    }

    /// Handles a new fix.
    pub async fn on_fix(&self, fix: &PositionFix, battery_level: Option<f64>, now: Instant) {
        let payload = PositionPayload::from_fix(&self.participant_id, fix, battery_level);
        let record = BufferedPosition::from_fix(&self.participant_id, &self.trip_id, fix, battery_level);

        let (publish, persist, connected) = {
            let mut state = self.state.lock().await;
            state.seq += 1;
            let seq = state.seq;
            let publish = if state.connected && state.subscribed {
                state.pending = None;
                Some(seq)
            } else {
                state.pending = Some((seq, payload.clone()));
                None
            };
            state.latest = Some(record);
            state.latest_persisted = false;
            let persist = state.claim_persist(now, self.persist_interval);
            (publish, persist, state.connected)
        };

        if let Some(seq) = publish {
            self.publish(seq, payload).await;
        }
        if let Some(record) = persist {
            self.persist(record, connected).await;
        }
    }

    /// The trip topic subscription was confirmed. Flushes the pending payload.
    pub async fn on_subscribed(&self) {
        let flush = {
            let mut state = self.state.lock().await;
            state.subscribed = true;
            if state.connected {
                state.pending.take()
            } else {
                None
            }
        };
        if let Some((seq, payload)) = flush {
            debug!("flushing pending position");
            self.publish(seq, payload).await;
        }
    }

    /// Connectivity changed. Going up drains the offline queue once.
    pub async fn on_connectivity(&self, connected: bool) {
        let (changed, drain) = {
            let mut state = self.state.lock().await;
            let changed = state.connected != connected;
            state.connected = connected;
            if !connected {
                state.subscribed = false;
            }
            let drain = changed && connected && !state.draining;
            if drain {
                state.draining = true;
            }
            (changed, drain)
        };
        match (changed, connected) {
            (true, true) => info!("relay connected"),
            (true, false) => warn!("relay disconnected, buffering positions"),
            _ => {}
        }
        if drain {
            self.drain().await;
        }
    }

    /// Persists the latest fix if it is unpersisted and the interval passed.
    pub async fn on_tick(&self, now: Instant) {
        let (persist, connected) = {
            let mut state = self.state.lock().await;
            (state.claim_persist(now, self.persist_interval), state.connected)
        };
        if let Some(record) = persist {
            self.persist(record, connected).await;
        }
    }

    /// When the next timer-driven durable write is due, if one is waiting.
    pub async fn next_persist_deadline(&self) -> Option<Instant> {
        let state = self.state.lock().await;
        if state.latest.is_none() || state.latest_persisted {
            return None;
        }
        Some(match state.last_persisted {
            Some(last) => last + self.persist_interval,
            None => Instant::now(),
        })
    }

    /// Drains the offline queue through the durable write path.
    async fn drain(&self) -> DrainOutcome {
        let result = self
            .queue
            .drain(|record| self.relay.upsert_position(PositionUpsert::from(&record)))
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "offline queue drain failed");
                DrainOutcome { sent: 0, remaining: self.count() }
            }
        };
        self.buffered.send_replace(outcome.remaining);
        if outcome.sent > 0 || outcome.remaining > 0 {
            info!(sent = outcome.sent, remaining = outcome.remaining, "offline queue drained");
        }

        let rewrite = {
            let mut state = self.state.lock().await;
            state.draining = false;
            // Drained records are older than the latest fix; write it again
            // so the store ends on the newest position.
            if outcome.sent > 0 && state.latest_persisted {
                state.latest.clone()
            } else {
                None
            }
        };
        if let Some(record) = rewrite {
            if let Err(e) = self.relay.upsert_position(PositionUpsert::from(&record)).await {
                debug!(error = %e, "rewrite of latest position failed");
            }
        }
        outcome
    }

    async fn publish(&self, seq: u64, payload: PositionPayload) {
        let event = ChannelEvent::Position(payload.clone());
        if let Err(e) = self.relay.publish(self.topic.clone(), event).await {
            warn!(error = %e, "position publish failed");
            let mut state = self.state.lock().await;
            if state.seq == seq {
                state.pending = Some((seq, payload));
            }
        }
    }

    async fn persist(&self, record: BufferedPosition, connected: bool) {
        if connected {
            match self.relay.upsert_position(PositionUpsert::from(&record)).await {
                Ok(()) => {
                    debug!("position persisted");
                    return;
                }
                Err(e) => warn!(error = %e, "durable write failed, queueing"),
            }
        }
        self.enqueue(&record);
    }

    fn enqueue(&self, record: &BufferedPosition) {
        if let Err(e) = self.queue.append(record) {
            error!(error = %e, "could not buffer position");
            return;
        }
        self.buffered.send_replace(self.count());
    }

    fn count(&self) -> usize {
        self.queue.count().unwrap_or_else(|e| {
            warn!(error = %e, "could not count offline queue");
            *self.buffered.borrow()
        })
    }

    /// Feeds sampler output and relay events through the manager until
    /// `cancel` fires or both inputs close.
    pub async fn run(
        &self,
        mut samples: mpsc::Receiver<SamplerEvent>,
        mut events: broadcast::Receiver<RelayEvent>,
        initially_connected: bool,
        cancel: CancellationToken,
    ) {
        if initially_connected {
            self.on_connectivity(true).await;
        }

        loop {
            let deadline = self.next_persist_deadline().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                sample = samples.recv() => match sample {
                    Some(SamplerEvent::Fix { fix, battery }) => {
                        self.on_fix(&fix, battery.map(|b| b.level), Instant::now()).await;
                    }
                    Some(SamplerEvent::ModeChanged(mode)) => info!(%mode, "sampling mode"),
                    Some(SamplerEvent::SourceError(e)) => warn!(error = %e, "position source"),
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(RelayEvent::Connected) => self.on_connectivity(true).await,
                    Ok(RelayEvent::Disconnected) => self.on_connectivity(false).await,
                    Ok(RelayEvent::Subscribed(topic)) if topic == self.topic => self.on_subscribed().await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => debug!(skipped = n, "relay events lagged"),
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_tick(Instant::now()).await;
                }
            }
        }
        debug!("sync manager stopped");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
