// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor-side map of the latest known position per participant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::Coordinate;
use crate::model::PositionPayload;

/// Latest position received for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivePositionEntry {
    pub coordinate: Coordinate,
    pub accuracy_m: Option<f64>,
    pub battery_level: Option<f64>,
    /// Receipt time, not the fix time.
    pub updated_at: DateTime<Utc>,
}

/// Last-write-wins position map keyed by participant id.
#[derive(Debug, Default, Clone)]
pub struct LivePositions {
    entries: HashMap<String, LivePositionEntry>,
}

impl LivePositions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the participant's entry with the payload's position.
    ///
    /// Payloads with non-finite coordinates are rejected and leave the
    /// previous entry in place.
    pub fn apply(&mut self, payload: &PositionPayload, received_at: DateTime<Utc>) -> Result<()> {
        let coordinate = payload.coordinate()?;
        self.entries.insert(
            payload.participant_id.clone(),
            LivePositionEntry {
                coordinate,
                accuracy_m: payload.accuracy_m,
                battery_level: payload.battery_level,
                updated_at: received_at,
            },
        );
        Ok(())
    }

    pub fn get(&self, participant_id: &str) -> Option<&LivePositionEntry> {
        self.entries.get(participant_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LivePositionEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Drops every entry, used when the monitored trip changes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
#[path = "positions_tests.rs"]
mod tests;
