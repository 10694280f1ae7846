// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use fw_core::Participant;

use crate::source::BatterySpec;

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Parse `ID=NAME`. A bare `ID` uses the id as the name.
fn parse_participant(s: &str) -> Result<Participant, String> {
    let (id, name) = s.split_once('=').unwrap_or((s, s));
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() {
        return Err(format!("invalid participant '{s}', expected ID=NAME"));
    }
    Ok(Participant::new(id, name))
}

fn parse_battery(s: &str) -> Result<BatterySpec, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

fn parse_radius(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(km) if km.is_finite() && km > 0.0 => Ok(km),
        _ => Err(format!("invalid radius '{s}', expected kilometers greater than zero")),
    }
}

#[derive(Parser)]
#[command(name = "fieldwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Location sharing and roll calls for supervised field trips")]
#[command(
    long_about = "Location sharing and roll calls for supervised field trips.\n\n\
    Participants share positions with the trip supervisor through a relay. \
    Supervisors watch a safe zone and run roll calls."
)]
pub struct Cli {
    /// State directory (defaults to $FIELDWATCH_STATE_DIR or ~/.local/state/fieldwatch)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Join a trip as a participant
    Join {
        /// Participant ID
        #[arg(long, value_parser = non_empty_string)]
        participant: String,

        /// Trip ID
        #[arg(long, value_parser = non_empty_string)]
        trip: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,
    },

    /// Leave the current trip
    Leave,

    /// Manage location sharing consent
    #[command(subcommand)]
    Consent(ConsentCommand),

    /// Share positions and answer roll calls until interrupted
    Run {
        /// Recorded fix track to replay (JSON Lines)
        #[arg(long, value_name = "FILE")]
        fixes: PathBuf,

        /// Start over when the track ends
        #[arg(long)]
        repeat: bool,

        /// Battery source: none, sysfs, or fixed:LEVEL[:charging]
        #[arg(long, default_value = "none", value_parser = parse_battery)]
        battery: BatterySpec,
    },

    /// Answer the open roll call
    Respond,

    /// Watch participants against the safe zone (supervisor)
    Monitor {
        /// Trip ID
        #[arg(long, value_parser = non_empty_string)]
        trip: String,

        /// Supervisor latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Supervisor longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Safe radius in kilometers
        #[arg(long, value_parser = parse_radius)]
        radius: f64,

        /// Participant to watch, as ID=NAME (repeatable)
        #[arg(long = "participant", value_name = "ID=NAME", value_parser = parse_participant)]
        participants: Vec<Participant>,
    },

    /// Run one roll call round (supervisor)
    RollCall {
        /// Trip ID
        #[arg(long, value_parser = non_empty_string)]
        trip: String,

        /// Supervisor ID
        #[arg(long, value_parser = non_empty_string)]
        supervisor: String,

        /// Round length in seconds (defaults to [roll_call] default_timeout_secs)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        timeout: Option<u32>,
    },

    /// Inspect the offline position queue
    #[command(subcommand)]
    Queue(QueueCommand),
}

#[derive(Subcommand)]
pub enum ConsentCommand {
    /// Allow location sharing for the joined participant
    Grant,
    /// Stop location sharing for the joined participant
    Revoke,
    /// Show whether location sharing is allowed
    Status,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Show how many positions are waiting for the relay
    Status,
}

impl Command {
    /// Whether the command keeps running until interrupted.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Command::Run { .. } | Command::Monitor { .. } | Command::RollCall { .. })
    }
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
