// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `join` and `leave`.

use std::path::Path;

use super::Context;
use crate::error::Result;
use crate::session::{Session, SessionStore};

pub fn join(state_dir: Option<&Path>, participant: String, trip: String, name: Option<String>) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    let (session, consented) = join_in(&ctx.state_dir, participant, trip, name)?;

    println!("Joined trip {} as {}", session.trip_id, session.participant_id);
    if !consented {
        println!();
        println!("Location sharing is off. Run 'fieldwatch consent grant' to start sharing.");
    }
    Ok(())
}

/// Starts a session. Returns it with whether consent is already recorded.
pub(crate) fn join_in(
    state_dir: &Path,
    participant: String,
    trip: String,
    name: Option<String>,
) -> Result<(Session, bool)> {
    let session = Session::new(participant, trip)?.with_display_name(name);
    let mut store = SessionStore::open(state_dir)?;
    store.init(session.clone())?;
    let consented = store.has_consent(&session.participant_id);
    Ok((session, consented))
}

pub fn leave(state_dir: Option<&Path>) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    match leave_in(&ctx.state_dir)? {
        Some(session) => println!("Left trip {}", session.trip_id),
        None => println!("Not in a trip"),
    }
    Ok(())
}

pub(crate) fn leave_in(state_dir: &Path) -> Result<Option<Session>> {
    SessionStore::open(state_dir)?.clear()
}

#[cfg(test)]
#[path = "participant_tests.rs"]
mod tests;
