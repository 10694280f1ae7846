// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Location sharing consent for the joined participant.
//!
//! Revoking never touches the supervisor's alert log. A running agent picks
//! up the change on its next consent check.

use std::path::Path;

use chrono::Utc;

use super::Context;
use crate::cli::ConsentCommand;
use crate::error::Result;
use crate::session::{ConsentRecord, SessionStore};

/// Consent state of the session participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentStatus {
    pub participant_id: String,
    pub record: Option<ConsentRecord>,
}

pub fn run(state_dir: Option<&Path>, command: ConsentCommand) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    match command {
        ConsentCommand::Grant => {
            let status = grant_in(&ctx.state_dir)?;
            println!("Location sharing enabled for {}", status.participant_id);
        }
        ConsentCommand::Revoke => {
            let (status, removed) = revoke_in(&ctx.state_dir)?;
            if removed {
                println!("Location sharing disabled for {}", status.participant_id);
            } else {
                println!("Location sharing was not enabled for {}", status.participant_id);
            }
        }
        ConsentCommand::Status => {
            let status = status_in(&ctx.state_dir)?;
            match status.record {
                Some(record) => println!(
                    "Location sharing: on (since {})",
                    record.granted_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => println!("Location sharing: off"),
            }
            println!("Participant: {}", status.participant_id);
        }
    }
    Ok(())
}

pub(crate) fn grant_in(state_dir: &Path) -> Result<ConsentStatus> {
    let mut store = SessionStore::open(state_dir)?;
    let participant_id = store.require_session()?.participant_id.clone();
    let record = store.grant_consent(&participant_id, Utc::now())?;
    Ok(ConsentStatus { participant_id, record: Some(record) })
}

pub(crate) fn revoke_in(state_dir: &Path) -> Result<(ConsentStatus, bool)> {
    let mut store = SessionStore::open(state_dir)?;
    let participant_id = store.require_session()?.participant_id.clone();
    let removed = store.revoke_consent(&participant_id)?;
    Ok((ConsentStatus { participant_id, record: None }, removed))
}

pub(crate) fn status_in(state_dir: &Path) -> Result<ConsentStatus> {
    let store = SessionStore::open(state_dir)?;
    let participant_id = store.require_session()?.participant_id.clone();
    let record = store.consent(&participant_id).copied();
    Ok(ConsentStatus { participant_id, record })
}

#[cfg(test)]
#[path = "consent_tests.rs"]
mod tests;
