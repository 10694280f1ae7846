// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Geofence alert engine.
//!
//! Each participant is either inside or outside the safe zone, a circle of
//! `radius_km` around the supervisor. The outside set alone decides whether
//! a transition fires. Active alerts are a separate, dismissible view: a
//! dismissed alert stays dismissed until the participant returns and leaves
//! again.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{distance_km, Coordinate};
use crate::model::Participant;
use crate::positions::LivePositions;

/// One entry in the alert log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertLogEntry {
    Exit {
        participant_id: String,
        name: String,
        distance_km: f64,
        time: DateTime<Utc>,
    },
    Return {
        participant_id: String,
        name: String,
        distance_km: f64,
        time: DateTime<Utc>,
    },
    RadiusChange {
        old_radius_km: f64,
        new_radius_km: f64,
        time: DateTime<Utc>,
    },
}

impl AlertLogEntry {
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            AlertLogEntry::Exit { time, .. }
            | AlertLogEntry::Return { time, .. }
            | AlertLogEntry::RadiusChange { time, .. } => *time,
        }
    }

    pub fn participant_id(&self) -> Option<&str> {
        match self {
            AlertLogEntry::Exit { participant_id, .. } | AlertLogEntry::Return { participant_id, .. } => {
                Some(participant_id)
            }
            AlertLogEntry::RadiusChange { .. } => None,
        }
    }
}

/// A visible alert for a participant currently outside the zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub participant_id: String,
    pub name: String,
    pub distance_km: f64,
    pub triggered_at: DateTime<Utc>,
}

/// Tracks zone membership, active alerts and the alert log for one trip.
#[derive(Debug, Default)]
pub struct AlertEngine {
    radius_km: Option<f64>,
    outside: HashSet<String>,
    active: Vec<ActiveAlert>,
    /// Newest first.
    log: VecDeque<AlertLogEntry>,
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with an initial radius. The initial radius is not logged.
    pub fn with_radius(radius_km: f64) -> Result<Self> {
        let mut engine = Self::new();
        engine.set_radius(radius_km, Utc::now())?;
        Ok(engine)
    }

    pub fn radius_km(&self) -> Option<f64> {
        self.radius_km
    }

    /// Sets the safe radius.
    ///
    /// Changing an existing radius logs a `radius_change` entry. Membership is
    /// not re-classified until the next `evaluate`.
    pub fn set_radius(&mut self, radius_km: f64, now: DateTime<Utc>) -> Result<()> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(Error::InvalidRadius(radius_km));
        }
        if let Some(old) = self.radius_km {
            if old != radius_km {
                self.log.push_front(AlertLogEntry::RadiusChange {
                    old_radius_km: old,
                    new_radius_km: radius_km,
                    time: now,
                });
            }
        }
        self.radius_km = Some(radius_km);
        Ok(())
    }

    /// Classifies every participant with a known position and returns the
    /// transitions this update produced, in roster order.
    ///
    /// Does nothing until a radius has been set.
    pub fn evaluate(
        &mut self,
        participants: &[Participant],
        positions: &LivePositions,
        supervisor: &Coordinate,
        now: DateTime<Utc>,
    ) -> Vec<AlertLogEntry> {
        let Some(radius_km) = self.radius_km else {
            return Vec::new();
        };

        let mut transitions = Vec::new();
        for participant in participants {
            let Some(entry) = positions.get(&participant.id) else {
                continue;
            };
            let distance = distance_km(supervisor, &entry.coordinate);
            let outside = distance > radius_km;
            let was_outside = self.outside.contains(&participant.id);

            let transition = match (was_outside, outside) {
                (false, true) => {
                    self.outside.insert(participant.id.clone());
                    self.active.retain(|a| a.participant_id != participant.id);
                    self.active.push(ActiveAlert {
                        participant_id: participant.id.clone(),
                        name: participant.name.clone(),
                        distance_km: distance,
                        triggered_at: now,
                    });
                    AlertLogEntry::Exit {
                        participant_id: participant.id.clone(),
                        name: participant.name.clone(),
                        distance_km: distance,
                        time: now,
                    }
                }
                (true, false) => {
                    self.outside.remove(&participant.id);
                    self.active.retain(|a| a.participant_id != participant.id);
                    AlertLogEntry::Return {
                        participant_id: participant.id.clone(),
                        name: participant.name.clone(),
                        distance_km: distance,
                        time: now,
                    }
                }
                _ => continue,
            };
            self.log.push_front(transition.clone());
            transitions.push(transition);
        }
        transitions
    }

    /// Hides the participant's active alert. Returns whether one was removed.
    ///
    /// The outside set and the log are untouched.
    pub fn dismiss_alert(&mut self, participant_id: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|a| a.participant_id != participant_id);
        self.active.len() != before
    }

    pub fn active_alerts(&self) -> &[ActiveAlert] {
        &self.active
    }

    /// The alert log, newest entry first.
    pub fn log(&self) -> impl Iterator<Item = &AlertLogEntry> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn is_outside(&self, participant_id: &str) -> bool {
        self.outside.contains(participant_id)
    }

    pub fn outside_count(&self) -> usize {
        self.outside.len()
    }
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
