// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor monitor.
//!
//! Applies position broadcasts from the trip topic to the live map and
//! re-evaluates the geofence after each one. Exit and return transitions are
//! logged and, when a log file is configured, appended to it as JSON Lines.
//!
//! The supervisor steers a running monitor with [`MonitorCommand`]s.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::protocol::{trip_topic, ChannelEvent};
use fw_core::{
    jsonl, ActiveAlert, AlertEngine, AlertLogEntry, ClockSource, Coordinate, LivePositions, Participant,
    PositionPayload,
};

use crate::error::{Error, Result};
use crate::sync::{RelayEvent, Subscriptions};

/// A supervisor command for a running monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorCommand {
    /// `dismiss ID`
    Dismiss(String),
    /// `radius KM`
    Radius(f64),
    /// `at LAT LNG`
    At(Coordinate),
    /// `alerts`
    Alerts,
    /// `status`
    Status,
    /// `trip ID`
    Trip(String),
}

impl FromStr for MonitorCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = || Error::InvalidCommand(line.trim().to_string());
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next(), words.next()) {
            (Some("dismiss"), Some(id), None) => MonitorCommand::Dismiss(id.to_string()),
            (Some("radius"), Some(km), None) => MonitorCommand::Radius(km.parse().map_err(|_| invalid())?),
            (Some("at"), Some(lat), Some(lng)) => {
                let lat: f64 = lat.parse().map_err(|_| invalid())?;
                let lng: f64 = lng.parse().map_err(|_| invalid())?;
                MonitorCommand::At(Coordinate::new(lat, lng)?)
            }
            (Some("alerts"), None, None) => MonitorCommand::Alerts,
            (Some("status"), None, None) => MonitorCommand::Status,
            (Some("trip"), Some(id), None) => MonitorCommand::Trip(id.to_string()),
            _ => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }
        Ok(command)
    }
}

/// What a running monitor reports.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorUpdate {
    Transition(AlertLogEntry),
    Dismissed { participant_id: String, found: bool },
    SupervisorMoved(Coordinate),
    ActiveAlerts(Vec<ActiveAlert>),
    Status(String),
    TripSwitched(String),
    /// A command that could not be carried out. Nothing changed.
    Rejected(String),
}

pub struct Monitor {
    trip_id: String,
    roster: Vec<Participant>,
    supervisor: Coordinate,
    positions: LivePositions,
    engine: AlertEngine,
    log_path: Option<PathBuf>,
}

impl Monitor {
    pub fn new(
        trip_id: impl Into<String>,
        roster: Vec<Participant>,
        supervisor: Coordinate,
        radius_km: f64,
    ) -> Result<Self> {
        Ok(Monitor {
            trip_id: trip_id.into(),
            roster,
            supervisor,
            positions: LivePositions::new(),
            engine: AlertEngine::with_radius(radius_km)?,
            log_path: None,
        })
    }

    /// Appends every transition to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn topic(&self) -> String {
        trip_topic(&self.trip_id)
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn positions(&self) -> &LivePositions {
        &self.positions
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn dismiss_alert(&mut self, participant_id: &str) -> bool {
        self.engine.dismiss_alert(participant_id)
    }

    pub fn supervisor(&self) -> Coordinate {
        self.supervisor
    }

    /// Moves the safe-zone center and re-evaluates the live map against it.
    pub fn set_supervisor(&mut self, supervisor: Coordinate, now: DateTime<Utc>) -> Vec<AlertLogEntry> {
        self.supervisor = supervisor;
        self.evaluate(now)
    }

    /// Changes the radius. Returns the `radius_change` entry when one was
    /// logged. Nobody is re-classified until the next evaluation.
    pub fn set_radius(&mut self, radius_km: f64, now: DateTime<Utc>) -> Result<Option<AlertLogEntry>> {
        let before = self.engine.log_len();
        self.engine.set_radius(radius_km, now)?;
        if self.engine.log_len() == before {
            return Ok(None);
        }
        let logged = self.engine.log().next().cloned();
        if let Some(entry) = &logged {
            info!(radius_km, "safe radius changed");
            self.persist(std::slice::from_ref(entry));
        }
        Ok(logged)
    }

    /// Starts monitoring another trip. The live map and zone membership
    /// belong to the old trip and are dropped; the radius is kept.
    pub fn switch_trip(&mut self, trip_id: impl Into<String>, roster: Vec<Participant>) -> Result<()> {
        self.trip_id = trip_id.into();
        self.roster = roster;
        self.positions.clear();
        self.engine = match self.engine.radius_km() {
            Some(radius) => AlertEngine::with_radius(radius)?,
            None => AlertEngine::new(),
        };
        info!(trip_id = %self.trip_id, "monitoring trip");
        Ok(())
    }

    /// Applies one position and returns the transitions it caused.
    pub fn on_position(&mut self, payload: &PositionPayload, now: DateTime<Utc>) -> Vec<AlertLogEntry> {
        if let Err(e) = self.positions.apply(payload, now) {
            warn!(participant_id = %payload.participant_id, error = %e, "dropping position");
            return Vec::new();
        }
        if !self.roster.iter().any(|p| p.id == payload.participant_id) {
            debug!(participant_id = %payload.participant_id, "adding unlisted participant");
            self.roster.push(Participant::new(&payload.participant_id, &payload.participant_id));
        }
        self.evaluate(now)
    }

    pub fn on_event(&mut self, event: &ChannelEvent, now: DateTime<Utc>) -> Vec<AlertLogEntry> {
        match event {
            ChannelEvent::Position(payload) => self.on_position(payload, now),
            _ => Vec::new(),
        }
    }

    /// Carries out one supervisor command.
    pub async fn execute<R>(&mut self, command: MonitorCommand, relay: &R, now: DateTime<Utc>) -> Vec<MonitorUpdate>
    where
        R: Subscriptions + ?Sized,
    {
        match command {
            MonitorCommand::Dismiss(participant_id) => {
                let found = self.dismiss_alert(&participant_id);
                vec![MonitorUpdate::Dismissed { participant_id, found }]
            }
            MonitorCommand::Radius(radius_km) => match self.set_radius(radius_km, now) {
                Ok(entry) => entry.into_iter().map(MonitorUpdate::Transition).collect(),
                Err(e) => vec![MonitorUpdate::Rejected(e.to_string())],
            },
            MonitorCommand::At(supervisor) => {
                let transitions = self.set_supervisor(supervisor, now);
                std::iter::once(MonitorUpdate::SupervisorMoved(supervisor))
                    .chain(transitions.into_iter().map(MonitorUpdate::Transition))
                    .collect()
            }
            MonitorCommand::Alerts => vec![MonitorUpdate::ActiveAlerts(self.engine.active_alerts().to_vec())],
            MonitorCommand::Status => vec![MonitorUpdate::Status(relay.status())],
            MonitorCommand::Trip(trip_id) => {
                if trip_id == self.trip_id {
                    return vec![MonitorUpdate::Rejected(format!("already monitoring trip {trip_id}"))];
                }
                if let Err(e) = relay.subscribe(trip_topic(&trip_id)).await {
                    return vec![MonitorUpdate::Rejected(e.to_string())];
                }
                if let Err(e) = relay.unsubscribe(self.topic()).await {
                    warn!(topic = %self.topic(), error = %e, "unsubscribe failed");
                }
                match self.switch_trip(trip_id.clone(), Vec::new()) {
                    Ok(()) => vec![MonitorUpdate::TripSwitched(trip_id)],
                    Err(e) => vec![MonitorUpdate::Rejected(e.to_string())],
                }
            }
        }
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<AlertLogEntry> {
        let transitions = self.engine.evaluate(&self.roster, &self.positions, &self.supervisor, now);
        for transition in &transitions {
            match transition {
                AlertLogEntry::Exit { participant_id, name, distance_km, .. } => {
                    warn!(%participant_id, %name, distance_km, "participant left the safe zone");
                }
                AlertLogEntry::Return { participant_id, name, distance_km, .. } => {
                    info!(%participant_id, %name, distance_km, "participant returned");
                }
                AlertLogEntry::RadiusChange { .. } => {}
            }
        }
        self.persist(&transitions);
        transitions
    }

    fn persist(&self, entries: &[AlertLogEntry]) {
        let Some(path) = &self.log_path else {
            return;
        };
        for entry in entries {
            if let Err(e) = jsonl::append(path, entry) {
                warn!(path = %path.display(), error = %e, "failed to append alert log");
            }
        }
    }
}

/// Feeds trip-topic events and supervisor commands to the monitor until
/// cancelled or the event stream closes. `on_update` sees every transition
/// and every command result.
pub async fn run_monitor<R, C, F>(
    monitor: &mut Monitor,
    relay: &R,
    mut events: broadcast::Receiver<RelayEvent>,
    mut commands: mpsc::Receiver<MonitorCommand>,
    clock: C,
    cancel: CancellationToken,
    mut on_update: F,
) where
    R: Subscriptions + ?Sized,
    C: ClockSource,
    F: FnMut(MonitorUpdate),
{
    let mut commands_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(RelayEvent::Event { topic, event }) if topic == monitor.topic() => {
                    for transition in monitor.on_event(&event, clock.now_utc()) {
                        on_update(MonitorUpdate::Transition(transition));
                    }
                }
                Ok(RelayEvent::Disconnected) => warn!("relay connection lost, positions may be stale"),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => warn!(skipped = n, "relay events lagged"),
                Err(broadcast::error::RecvError::Closed) => break,
            },
            command = commands.recv(), if commands_open => match command {
                Some(command) => {
                    debug!(?command, "monitor command");
                    for update in monitor.execute(command, relay, clock.now_utc()).await {
                        on_update(update);
                    }
                }
                None => commands_open = false,
            },
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
