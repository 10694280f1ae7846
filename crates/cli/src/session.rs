// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Participant session and location-sharing consent.
//!
//! Stored in `session.toml` in the state directory:
//!
//! ```toml
//! [session]
//! participant_id = "s-17"
//! trip_id = "rome-2026"
//! display_name = "Ada"
//!
//! [consent.s-17]
//! granted_at = "2026-04-02T08:15:00Z"
//! ```
//!
//! Every write rewrites the whole file. Consent survives `leave` so a
//! participant who rejoins does not have to opt in again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SESSION_FILE_NAME: &str = "session.toml";

/// The joined participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub participant_id: String,
    pub trip_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Session {
    pub fn new(participant_id: impl Into<String>, trip_id: impl Into<String>) -> Result<Self> {
        let participant_id = participant_id.into();
        let trip_id = trip_id.into();
        if participant_id.trim().is_empty() {
            return Err(Error::FieldEmpty { field: "participant id" });
        }
        if trip_id.trim().is_empty() {
            return Err(Error::FieldEmpty { field: "trip id" });
        }
        Ok(Session { participant_id, trip_id, display_name: None })
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name.filter(|n| !n.trim().is_empty());
        self
    }
}

/// A recorded opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub granted_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<Session>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    consent: BTreeMap<String, ConsentRecord>,
}

/// File-backed session and consent store.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    file: SessionFile,
}

impl SessionStore {
    /// Opens the store in `state_dir`. A missing file is an empty store.
    pub fn open(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(SESSION_FILE_NAME);
        let file = read_file(&path)?;
        Ok(SessionStore { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file, picking up changes made by other processes.
    pub fn reload(&mut self) -> Result<()> {
        self.file = read_file(&self.path)?;
        Ok(())
    }

    pub fn session(&self) -> Option<&Session> {
        self.file.session.as_ref()
    }

    /// The current session, or [`Error::NoSession`].
    pub fn require_session(&self) -> Result<&Session> {
        self.session().ok_or(Error::NoSession)
    }

    /// Replaces the current session.
    pub fn init(&mut self, session: Session) -> Result<()> {
        self.file.session = Some(session);
        self.save()
    }

    /// Drops the current session. Returns the one that was cleared.
    pub fn clear(&mut self) -> Result<Option<Session>> {
        let previous = self.file.session.take();
        self.save()?;
        Ok(previous)
    }

    /// Records consent. Granting again keeps the original timestamp.
    pub fn grant_consent(&mut self, participant_id: &str, now: DateTime<Utc>) -> Result<ConsentRecord> {
        let record = *self
            .file
            .consent
            .entry(participant_id.to_string())
            .or_insert(ConsentRecord { granted_at: now });
        self.save()?;
        Ok(record)
    }

    /// Withdraws consent. Returns whether any was recorded.
    pub fn revoke_consent(&mut self, participant_id: &str) -> Result<bool> {
        let removed = self.file.consent.remove(participant_id).is_some();
        self.save()?;
        Ok(removed)
    }

    pub fn consent(&self, participant_id: &str) -> Option<&ConsentRecord> {
        self.file.consent.get(participant_id)
    }

    pub fn has_consent(&self, participant_id: &str) -> bool {
        self.file.consent.contains_key(participant_id)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.file)
            .map_err(|e| Error::Session(format!("failed to serialize session: {}", e)))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<SessionFile> {
    match fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content)
            .map_err(|e| Error::Session(format!("failed to parse {}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionFile::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
