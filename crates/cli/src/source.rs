// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Position and battery capabilities.
//!
//! A [`PositionSource`] produces fixes into a channel for as long as the
//! [`WatchGuard`] returned by `watch` is alive. A [`BatterySource`] answers
//! with the current battery state, or `None` when there is no telemetry.
//!
//! Shipped implementations:
//! - [`ReplaySource`]: replays a recorded JSONL track
//! - [`NoBattery`], [`FixedBattery`], [`SysfsBattery`]

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fw_core::{jsonl, BatteryStatus, Coordinate, PositionFix};

use crate::error::{Error, Result};

/// Whether the device can produce fixes at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Supported,
    /// No positioning hardware or API.
    Unsupported,
    /// Present but the user denied access.
    Denied,
}

/// Failure reported by a position source. Never terminates the watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SourceError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("timed out waiting for a fix")]
    Timeout,
    #[error("unknown position error")]
    Unknown,
}

/// What a watch delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix(PositionFix),
    Error(SourceError),
}

/// Per-watch request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchParams {
    pub high_accuracy: bool,
    /// Longest wait for a single fix before reporting a timeout.
    pub timeout: Duration,
    /// Oldest cached fix the source may hand back.
    pub maximum_age: Duration,
    /// Shortest spacing between delivered fixes.
    pub min_interval: Duration,
}

/// Releases a watch when dropped.
#[derive(Debug)]
pub struct WatchGuard {
    cancel: CancellationToken,
}

impl WatchGuard {
    pub fn new(cancel: CancellationToken) -> Self {
        WatchGuard { cancel }
    }

    /// Token cancelled when the guard is dropped.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A continuous fix source.
pub trait PositionSource: Send + Sync {
    fn availability(&self) -> Availability;

    /// Starts delivering events into `sink` until the guard is dropped.
    fn watch(&self, params: WatchParams, sink: mpsc::Sender<SourceEvent>) -> WatchGuard;
}

/// Battery telemetry.
pub trait BatterySource: Send + Sync {
    fn status(&self) -> Option<BatteryStatus>;
}

impl<T: BatterySource + ?Sized> BatterySource for Box<T> {
    fn status(&self) -> Option<BatteryStatus> {
        (**self).status()
    }
}

/// One line of a recorded track.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TrackEntry {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy_m: Option<f64>,
    },
    Error { error: SourceError },
}

/// Replays a recorded track, one entry per `min_interval`.
///
/// Watches share a cursor, so a watch opened after a mode change continues
/// where the previous one stopped. Once the track is exhausted the source
/// reports a timeout every `timeout`, like a receiver that lost the sky.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    entries: Arc<Vec<TrackEntry>>,
    cursor: Arc<AtomicUsize>,
    repeat: bool,
}

impl ReplaySource {
    pub fn new(entries: Vec<TrackEntry>, repeat: bool) -> Self {
        ReplaySource {
            entries: Arc::new(entries),
            cursor: Arc::new(AtomicUsize::new(0)),
            repeat,
        }
    }

    /// Loads a JSONL track. Coordinates are validated up front.
    pub fn load(path: &Path, repeat: bool) -> Result<Self> {
        let entries: Vec<TrackEntry> = jsonl::read_all(path)?;
        if entries.is_empty() {
            return Err(Error::EmptyTrack(path.display().to_string()));
        }
        for entry in &entries {
            if let TrackEntry::Fix { latitude, longitude, .. } = entry {
                Coordinate::new(*latitude, *longitude)?;
            }
        }
        Ok(Self::new(entries, repeat))
    }

    /// Entries not yet delivered. Always the full track when repeating.
    pub fn remaining(&self) -> usize {
        if self.repeat {
            return self.entries.len();
        }
        self.entries.len().saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    fn next_entry(&self) -> Option<TrackEntry> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.repeat {
            self.entries.get(index % len).cloned()
        } else {
            self.entries.get(index).cloned()
        }
    }
}

impl PositionSource for ReplaySource {
    fn availability(&self) -> Availability {
        Availability::Supported
    }

    fn watch(&self, params: WatchParams, sink: mpsc::Sender<SourceEvent>) -> WatchGuard {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let source = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(params.min_interval.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let event = match source.next_entry() {
                    Some(TrackEntry::Fix { latitude, longitude, accuracy_m }) => {
                        match Coordinate::new(latitude, longitude) {
                            Ok(coordinate) => SourceEvent::Fix(PositionFix::new(coordinate, accuracy_m, Utc::now())),
                            Err(_) => SourceEvent::Error(SourceError::Unknown),
                        }
                    }
                    Some(TrackEntry::Error { error }) => SourceEvent::Error(error),
                    None => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(params.timeout) => {}
                        }
                        SourceEvent::Error(SourceError::Timeout)
                    }
                };
                if sink.send(event).await.is_err() {
                    break;
                }
            }
            debug!("replay watch released");
        });

        WatchGuard::new(cancel)
    }
}

/// No battery telemetry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBattery;

impl BatterySource for NoBattery {
    fn status(&self) -> Option<BatteryStatus> {
        None
    }
}

/// Always reports the same battery state.
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub BatteryStatus);

impl BatterySource for FixedBattery {
    fn status(&self) -> Option<BatteryStatus> {
        Some(self.0)
    }
}

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Reads a Linux power supply from sysfs.
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    dir: PathBuf,
}

impl SysfsBattery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SysfsBattery { dir: dir.into() }
    }

    /// Finds the first `BAT*` entry under `/sys/class/power_supply`.
    pub fn detect() -> Result<Self> {
        Self::detect_in(Path::new(POWER_SUPPLY_DIR))
    }

    pub fn detect_in(root: &Path) -> Result<Self> {
        let not_found = || Error::BatteryNotFound(root.display().to_string());
        let mut names: Vec<PathBuf> = std::fs::read_dir(root)
            .map_err(|_| not_found())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("BAT"))
            })
            .collect();
        names.sort();
        names.into_iter().next().map(Self::new).ok_or_else(not_found)
    }
}

impl BatterySource for SysfsBattery {
    fn status(&self) -> Option<BatteryStatus> {
        let capacity = std::fs::read_to_string(self.dir.join("capacity")).ok()?;
        let percent: f64 = capacity.trim().parse().ok()?;
        let state = std::fs::read_to_string(self.dir.join("status")).unwrap_or_default();
        let charging = matches!(state.trim(), "Charging" | "Full");
        BatteryStatus::new((percent / 100.0).clamp(0.0, 1.0), charging).ok()
    }
}

/// Battery source chosen on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum BatterySpec {
    None,
    Sysfs,
    Fixed(BatteryStatus),
}

impl FromStr for BatterySpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidBatterySpec(s.to_string());
        match s {
            "none" => return Ok(BatterySpec::None),
            "sysfs" => return Ok(BatterySpec::Sysfs),
            _ => {}
        }
        let rest = s.strip_prefix("fixed:").ok_or_else(invalid)?;
        let (level, charging) = match rest.split_once(':') {
            Some((level, "charging")) => (level, true),
            Some(_) => return Err(invalid()),
            None => (rest, false),
        };
        let level: f64 = level.parse().map_err(|_| invalid())?;
        let status = BatteryStatus::new(level, charging).map_err(|_| invalid())?;
        Ok(BatterySpec::Fixed(status))
    }
}

impl BatterySpec {
    pub fn open(&self) -> Result<Box<dyn BatterySource>> {
        Ok(match self {
            BatterySpec::None => Box::new(NoBattery),
            BatterySpec::Sysfs => Box::new(SysfsBattery::detect()?),
            BatterySpec::Fixed(status) => Box::new(FixedBattery(*status)),
        })
    }
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
