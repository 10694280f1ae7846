// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `roll-call`: one supervisor round.

use std::path::Path;

use fw_core::protocol::supervisor_topic;

use super::{block_on, connect, interrupt_token, Context};
use crate::error::{Error, Result};
use crate::rollcall::{run_round, Coordinator, OpenRound};

pub fn run(state_dir: Option<&Path>, trip: String, supervisor: String, timeout: Option<u32>) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    let timeout = timeout.unwrap_or(ctx.config.roll_call.default_timeout_secs).max(1);

    let closed = block_on(async {
        let client = connect(&ctx.config).await?;
        let events = client.events();
        client.subscribe(supervisor_topic(&trip)).await?;

        println!("Roll call started for trip {trip}, closing in {timeout}s");
        let mut coordinator = Coordinator::new(client.clone(), trip.clone(), supervisor);
        let closed = run_round(&mut coordinator, timeout, events, interrupt_token(), |response| {
            println!("  {} responded at {}", response.participant_id, response.responded_at.format("%H:%M:%S"));
        })
        .await;
        client.shutdown();
        Ok::<_, Error>(closed?)
    })??;

    if let Some(round) = closed {
        println!("{}", summary(&round));
    }
    Ok(())
}

pub(crate) fn summary(round: &OpenRound) -> String {
    let count = round.responses.len();
    let noun = if count == 1 { "response" } else { "responses" };
    if round.remaining > 1 {
        format!("Roll call #{} ended early with {count} {noun}", round.roll_call.id)
    } else {
        format!("Roll call #{} closed with {count} {noun}", round.roll_call.id)
    }
}

#[cfg(test)]
#[path = "roll_call_tests.rs"]
mod tests;
