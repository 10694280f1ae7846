// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `respond`: answer the open roll call once and exit.

use std::path::Path;

use fw_core::{ClockSource, SystemClock};

use super::{block_on, connect, Context};
use crate::error::{Error, Result};
use crate::rollcall::{RespondOutcome, Responder};
use crate::session::{Session, SessionStore};
use crate::sync::{ClientError, RollCallStore};

pub fn run(state_dir: Option<&Path>) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    let session = SessionStore::open(&ctx.state_dir)?.require_session()?.clone();

    let outcome = block_on(async {
        let client = connect(&ctx.config).await?;
        let outcome = respond_once(client.clone(), &session, &SystemClock).await;
        client.shutdown();
        outcome
    })??;

    if let RespondOutcome::Failed(message) = outcome {
        return Err(Error::Client(ClientError::Rpc(message)));
    }
    println!("{}", describe(&outcome));
    Ok(())
}

/// Looks up the trip's open round and answers it.
pub(crate) async fn respond_once<S, C>(store: S, session: &Session, clock: &C) -> Result<RespondOutcome>
where
    S: RollCallStore,
    C: ClockSource,
{
    let mut responder = Responder::new(store, session.participant_id.clone(), session.trip_id.clone());
    responder.refresh(clock.now_utc()).await?;
    Ok(responder.respond(clock.now_utc()).await)
}

pub(crate) fn describe(outcome: &RespondOutcome) -> String {
    match outcome {
        RespondOutcome::NoActiveRound => "No roll call in progress".to_string(),
        RespondOutcome::AlreadyResponded => "Already responded to this roll call".to_string(),
        RespondOutcome::Recorded(response) => {
            format!("Response recorded for roll call #{}", response.roll_call_id)
        }
        RespondOutcome::Failed(message) => format!("Response failed: {message}"),
    }
}

#[cfg(test)]
#[path = "respond_tests.rs"]
mod tests;
