// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `monitor`: the supervisor's live view of the safe zone.
//!
//! Reads supervisor commands from stdin while running.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fw_core::{AlertLogEntry, Coordinate, Participant, SystemClock};

use super::{block_on, interrupt_token, Context};
use crate::error::{Error, Result};
use crate::monitor::{run_monitor, Monitor, MonitorCommand, MonitorUpdate};
use crate::sync::RelayClient;

pub fn run(
    state_dir: Option<&Path>,
    trip: String,
    lat: f64,
    lng: f64,
    radius_km: f64,
    participants: Vec<Participant>,
) -> Result<()> {
    let ctx = Context::load(state_dir)?;
    let supervisor = Coordinate::new(lat, lng)?;
    std::fs::create_dir_all(&ctx.state_dir)?;
    let mut monitor =
        Monitor::new(trip, participants, supervisor, radius_km)?.with_log_file(ctx.alerts_path());

    println!(
        "Monitoring trip {}: {} km around {:.5}, {:.5}",
        monitor.trip_id(),
        radius_km,
        supervisor.latitude,
        supervisor.longitude
    );
    println!("Alert log: {}", ctx.alerts_path().display());
    println!("Commands: dismiss ID, radius KM, at LAT LNG, alerts, status, trip ID");

    block_on(async {
        let cancel = interrupt_token();
        let (command_tx, command_rx) = mpsc::channel(8);
        tokio::spawn(read_commands(command_tx, cancel.clone()));

        let client = RelayClient::spawn(ctx.config.relay.connection_config());
        let events = client.events();
        client.subscribe(monitor.topic()).await?;

        run_monitor(&mut monitor, &client, events, command_rx, SystemClock, cancel, |update| {
            println!("{}", describe_update(&update))
        })
        .await;
        client.shutdown();
        Ok::<_, Error>(())
    })??;

    println!(
        "Stopped. {} participants seen, {} outside the zone",
        monitor.positions().len(),
        monitor.engine().outside_count()
    );
    Ok(())
}

async fn read_commands(commands: mpsc::Sender<MonitorCommand>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<MonitorCommand>() {
                    Ok(command) => {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                },
                Ok(None) | Err(_) => break,
            },
        }
    }
}

pub(crate) fn describe_update(update: &MonitorUpdate) -> String {
    match update {
        MonitorUpdate::Transition(entry) => describe(entry),
        MonitorUpdate::Dismissed { participant_id, found: true } => format!("Dismissed alert for {participant_id}"),
        MonitorUpdate::Dismissed { participant_id, found: false } => format!("No active alert for {participant_id}"),
        MonitorUpdate::SupervisorMoved(at) => {
            format!("Safe zone now centered on {:.5}, {:.5}", at.latitude, at.longitude)
        }
        MonitorUpdate::ActiveAlerts(alerts) if alerts.is_empty() => "No active alerts".to_string(),
        MonitorUpdate::ActiveAlerts(alerts) => alerts
            .iter()
            .map(|a| {
                format!(
                    "{} ALERT {} ({}) {:.2} km away",
                    a.triggered_at.format("%H:%M:%S"),
                    a.name,
                    a.participant_id,
                    a.distance_km
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        MonitorUpdate::Status(status) => format!("Relay: {status}"),
        MonitorUpdate::TripSwitched(trip_id) => format!("Monitoring trip {trip_id}"),
        MonitorUpdate::Rejected(message) => format!("Rejected: {message}"),
    }
}

pub(crate) fn describe(entry: &AlertLogEntry) -> String {
    let time = entry.time().format("%H:%M:%S");
    match entry {
        AlertLogEntry::Exit { name, participant_id, distance_km, .. } => {
            format!("{time} ALERT {name} ({participant_id}) left the safe zone, {distance_km:.2} km away")
        }
        AlertLogEntry::Return { name, participant_id, distance_km, .. } => {
            format!("{time} {name} ({participant_id}) is back inside, {distance_km:.2} km away")
        }
        AlertLogEntry::RadiusChange { old_radius_km, new_radius_km, .. } => {
            format!("{time} radius changed from {old_radius_km} km to {new_radius_km} km")
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
