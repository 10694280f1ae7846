// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `run`: the participant agent in the foreground.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{block_on, interrupt_token, Context};
use crate::agent::{Agent, AgentExit};
use crate::error::Result;
use crate::rollcall::{ResponderUpdate, RoundChange};
use crate::source::{BatterySpec, ReplaySource};
use crate::sync::RelayClient;

pub fn run(state_dir: Option<&Path>, fixes: PathBuf, repeat: bool, battery: BatterySpec) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    let source = ReplaySource::load(&fixes, repeat)?;
    let agent = Agent::new(&ctx.state_dir, ctx.config.clone(), source, battery.open()?)?;

    let session = agent.session();
    println!("Sharing location for {} on trip {}", session.participant_id, session.trip_id);
    println!("Press Enter to answer a roll call, Ctrl-C to stop.");

    let exit = block_on(async move {
        let cancel = interrupt_token();
        let (respond_tx, respond_rx) = mpsc::channel(4);
        tokio::spawn(read_enter_presses(respond_tx, cancel.clone()));

        let client = RelayClient::spawn(ctx.config.relay.connection_config());
        agent
            .run(client, respond_rx, cancel, |update| println!("{}", describe(&update)))
            .await
    })??;

    match exit {
        AgentExit::ConsentRevoked => println!("Location sharing stopped: consent was revoked"),
        AgentExit::Cancelled => println!("Location sharing stopped"),
    }
    Ok(())
}

async fn read_enter_presses(requests: mpsc::Sender<()>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(_)) => {
                    if requests.send(()).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            },
        }
    }
}

pub(crate) fn describe(update: &ResponderUpdate) -> String {
    match update {
        ResponderUpdate::Round(RoundChange::Opened(round)) => {
            format!("Roll call #{}: press Enter to respond ({}s left)", round.id, round.remaining)
        }
        ResponderUpdate::Round(RoundChange::Cleared(id)) => format!("Roll call #{id} closed"),
        ResponderUpdate::Responded(outcome) => super::respond::describe(outcome),
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
