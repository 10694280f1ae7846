// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline queue for positions captured while the relay is unreachable.
//!
//! Records live in a small SQLite database (`queue.db` in the state
//! directory) so they survive restarts. Each row holds one
//! [`BufferedPosition`] as JSON; the autoincrement id keeps capture order.
//!
//! Draining sends rows oldest first and deletes each one only after it was
//! sent, so a crash or a failed send never loses a record. It may resend
//! one, which is fine because position upserts are idempotent.

use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::debug;

use fw_core::BufferedPosition;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS buffered_positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL
);
"#;

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainOutcome {
    pub sent: usize,
    pub remaining: usize,
}

/// Durable FIFO of buffered positions.
pub struct OfflineQueue {
    conn: Mutex<Connection>,
}

impl OfflineQueue {
    /// Opens or creates the queue database at `path`.
    pub fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(OfflineQueue { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(OfflineQueue { conn: Mutex::new(conn) })
    }

    /// Appends a record. It is on disk when this returns.
    pub fn append(&self, record: &BufferedPosition) -> QueueResult<()> {
        let payload = serde_json::to_string(record)?;
        self.lock().execute(
            "INSERT INTO buffered_positions (payload, enqueued_at) VALUES (?1, ?2)",
            params![payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn count(&self) -> QueueResult<usize> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM buffered_positions", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// All records, oldest first.
    pub fn records(&self) -> QueueResult<Vec<BufferedPosition>> {
        Ok(self.snapshot()?.into_iter().map(|(_, record)| record).collect())
    }

    /// Sends every record through `send` in capture order.
    ///
    /// Each record is deleted after `send` succeeds. The first failure stops
    /// the pass and leaves that record and everything after it queued.
    /// Records appended during the pass wait for the next one.
    pub async fn drain<F, Fut, E>(&self, mut send: F) -> QueueResult<DrainOutcome>
    where
        F: FnMut(BufferedPosition) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let rows = self.snapshot()?;
        let mut outcome = DrainOutcome::default();
        if rows.is_empty() {
            return Ok(outcome);
        }

        for (id, record) in rows {
            if let Err(e) = send(record).await {
                debug!(error = %e, "drain stopped");
                break;
            }
            self.lock().execute("DELETE FROM buffered_positions WHERE id = ?1", params![id])?;
            outcome.sent += 1;
        }
        outcome.remaining = self.count()?;
        Ok(outcome)
    }

    fn snapshot(&self) -> QueueResult<Vec<(i64, BufferedPosition)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, payload FROM buffered_positions ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let mut records = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            match serde_json::from_str(&payload) {
                Ok(record) => records.push((id, record)),
                Err(e) => {
                    tracing::warn!(id, error = %e, "dropping corrupt queue row");
                    self.lock().execute("DELETE FROM buffered_positions WHERE id = ?1", params![id])?;
                }
            }
        }
        Ok(records)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
