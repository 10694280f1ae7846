// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable relay storage.
//!
//! Latest position per participant and the roll-call tables, in one SQLite
//! database under the data directory.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use fw_core::{PositionUpsert, RollCall, RollCallResponse};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown roll call: {0}")]
    UnknownRollCall(i64),

    #[error("corrupted timestamp: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS positions (
    participant_id TEXT PRIMARY KEY,
    trip_id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    accuracy_m REAL,
    battery_level REAL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roll_calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    trip_id TEXT NOT NULL,
    supervisor_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    timeout_seconds INTEGER NOT NULL,
    closed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_roll_calls_open ON roll_calls(trip_id, closed_at);

CREATE TABLE IF NOT EXISTS roll_call_responses (
    roll_call_id INTEGER NOT NULL REFERENCES roll_calls(id),
    participant_id TEXT NOT NULL,
    responded_at TEXT NOT NULL,
    PRIMARY KEY (roll_call_id, participant_id)
);
"#;

pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Opens the store at `path`, creating the file and schema if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn })
    }

    /// Replaces the participant's stored position.
    pub fn upsert_position(&self, position: &PositionUpsert, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO positions
                 (participant_id, trip_id, latitude, longitude, accuracy_m, battery_level, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(participant_id) DO UPDATE SET
                 trip_id = excluded.trip_id,
                 latitude = excluded.latitude,
                 longitude = excluded.longitude,
                 accuracy_m = excluded.accuracy_m,
                 battery_level = excluded.battery_level,
                 updated_at = excluded.updated_at",
            params![
                position.participant_id,
                position.trip_id,
                position.latitude,
                position.longitude,
                position.accuracy_m,
                position.battery_level,
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Starts a round, closing whatever round the trip still has open.
    pub fn create_roll_call(
        &mut self,
        trip_id: &str,
        supervisor_id: &str,
        timeout_seconds: u32,
        now: DateTime<Utc>,
    ) -> Result<RollCall> {
        let started_at = now.to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE roll_calls SET closed_at = ?1 WHERE trip_id = ?2 AND closed_at IS NULL",
            params![started_at, trip_id],
        )?;
        tx.execute(
            "INSERT INTO roll_calls (trip_id, supervisor_id, started_at, timeout_seconds)
             VALUES (?1, ?2, ?3, ?4)",
            params![trip_id, supervisor_id, started_at, timeout_seconds],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(RollCall { id, trip_id: trip_id.to_string(), started_at: now, timeout_seconds, closed_at: None })
    }

    /// Marks a round closed. Closing twice keeps the first close time.
    pub fn close_roll_call(&self, roll_call_id: i64, now: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE roll_calls SET closed_at = ?1 WHERE id = ?2 AND closed_at IS NULL",
            params![now.to_rfc3339(), roll_call_id],
        )?;
        Ok(())
    }

    /// The trip's open round, newest first.
    pub fn open_roll_call(&self, trip_id: &str) -> Result<Option<RollCall>> {
        self.conn
            .query_row(
                "SELECT id, trip_id, started_at, timeout_seconds, closed_at FROM roll_calls
                 WHERE trip_id = ?1 AND closed_at IS NULL
                 ORDER BY id DESC LIMIT 1",
                params![trip_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?
            .map(|(id, trip_id, started_at, timeout_seconds, closed_at)| {
                Ok(RollCall {
                    id,
                    trip_id,
                    started_at: parse_timestamp(&started_at)?,
                    timeout_seconds,
                    closed_at: closed_at.as_deref().map(parse_timestamp).transpose()?,
                })
            })
            .transpose()
    }

    /// The trip a round belongs to.
    pub fn roll_call_trip(&self, roll_call_id: i64) -> Result<Option<String>> {
        let trip = self
            .conn
            .query_row("SELECT trip_id FROM roll_calls WHERE id = ?1", params![roll_call_id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(trip)
    }

    /// Records a response. `None` when the participant already responded or
    /// the round is closed.
    pub fn record_response(
        &self,
        roll_call_id: i64,
        participant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RollCallResponse>> {
        let closed_at: Option<String> = self
            .conn
            .query_row("SELECT closed_at FROM roll_calls WHERE id = ?1", params![roll_call_id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or(StoreError::UnknownRollCall(roll_call_id))?;
        if closed_at.is_some() {
            return Ok(None);
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO roll_call_responses (roll_call_id, participant_id, responded_at)
             VALUES (?1, ?2, ?3)",
            params![roll_call_id, participant_id, now.to_rfc3339()],
        )?;
        Ok((inserted > 0).then(|| RollCallResponse {
            roll_call_id,
            participant_id: participant_id.to_string(),
            responded_at: now,
        }))
    }

    pub fn response_count(&self, roll_call_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM roll_call_responses WHERE roll_call_id = ?1",
            params![roll_call_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupted(s.to_string()))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
