// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model shared by the agent, the supervisor side and the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Coordinate;

/// A single reading from a position source.
///
/// Fixes are superseded by the next fix, never merged or mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Horizontal accuracy in meters, when the source reports one.
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate, accuracy_m: Option<f64>, timestamp: DateTime<Utc>) -> Self {
        PositionFix { coordinate, accuracy_m, timestamp }
    }
}

/// Device battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge as a fraction between 0.0 and 1.0.
    pub level: f64,
    pub charging: bool,
}

impl BatteryStatus {
    pub fn new(level: f64, charging: bool) -> Result<Self> {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::InvalidBatteryLevel(level));
        }
        Ok(BatteryStatus { level, charging })
    }

    /// True when the level is under `threshold` and the device is not charging.
    pub fn is_low(&self, threshold: f64) -> bool {
        !self.charging && self.level < threshold
    }
}

/// A monitored participant on the supervisor's roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Participant { id: id.into(), name: name.into() }
    }
}

/// Position broadcast on the trip topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub participant_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
    pub battery_level: Option<f64>,
}

impl PositionPayload {
    pub fn from_fix(participant_id: &str, fix: &PositionFix, battery_level: Option<f64>) -> Self {
        PositionPayload {
            participant_id: participant_id.to_string(),
            latitude: fix.coordinate.latitude,
            longitude: fix.coordinate.longitude,
            accuracy_m: fix.accuracy_m,
            battery_level,
        }
    }

    /// The payload's coordinate, validated.
    pub fn coordinate(&self) -> Result<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A position record waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedPosition {
    pub participant_id: String,
    pub trip_id: String,
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub battery_level: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl BufferedPosition {
    pub fn from_fix(
        participant_id: &str,
        trip_id: &str,
        fix: &PositionFix,
        battery_level: Option<f64>,
    ) -> Self {
        BufferedPosition {
            participant_id: participant_id.to_string(),
            trip_id: trip_id.to_string(),
            coordinate: fix.coordinate,
            accuracy_m: fix.accuracy_m,
            battery_level,
            recorded_at: fix.timestamp,
        }
    }
}

/// Arguments of the durable position upsert.
///
/// Upserts are keyed by participant, so repeating one is harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpsert {
    pub participant_id: String,
    pub trip_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

impl From<&BufferedPosition> for PositionUpsert {
    fn from(record: &BufferedPosition) -> Self {
        PositionUpsert {
            participant_id: record.participant_id.clone(),
            trip_id: record.trip_id.clone(),
            latitude: record.coordinate.latitude,
            longitude: record.coordinate.longitude,
            accuracy_m: record.accuracy_m,
            battery_level: record.battery_level,
        }
    }
}

/// A roll-call round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollCall {
    pub id: i64,
    pub trip_id: String,
    pub started_at: DateTime<Utc>,
    pub timeout_seconds: u32,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RollCall {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// A participant's acknowledgment of a roll-call round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollCallResponse {
    pub roll_call_id: i64,
    pub participant_id: String,
    pub responded_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
