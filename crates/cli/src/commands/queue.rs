// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use fw_core::BufferedPosition;

use super::Context;
use crate::agent::queue_path;
use crate::cli::QueueCommand;
use crate::error::Result;
use crate::sync::OfflineQueue;

pub fn run(state_dir: Option<&Path>, command: QueueCommand) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    match command {
        QueueCommand::Status => {
            let records = records_in(&ctx.state_dir)?;
            println!("Buffered positions: {}", records.len());
            if let (Some(first), Some(last)) = (records.first(), records.last()) {
                println!("Oldest: {}", first.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"));
                println!("Newest: {}", last.recorded_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("Relay: {}", ctx.config.relay.url);
        }
    }
    Ok(())
}

/// Buffered records, oldest first. A missing queue reads as empty.
pub(crate) fn records_in(state_dir: &Path) -> Result<Vec<BufferedPosition>> {
    let path = queue_path(state_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(OfflineQueue::open(&path)?.records()?)
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
