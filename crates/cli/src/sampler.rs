// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Adaptive position sampler.
//!
//! Two modes: high-accuracy (initial) and power-save. The sampler drops to
//! power-save when nothing has moved the movement threshold for the
//! stationary duration, or as soon as the battery goes low while not
//! charging. The first fix that moves the threshold from the last known
//! position brings it back to high-accuracy.
//!
//! [`AdaptiveSampler`] is the pure state machine. [`run_sampler`] drives it
//! against a [`PositionSource`] and restarts the watch on every mode change.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fw_core::{distance_m, BatteryStatus, Coordinate, PositionFix};

use crate::source::{Availability, BatterySource, PositionSource, SourceError, SourceEvent, WatchParams};

/// Sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    HighAccuracy,
    PowerSave,
}

impl SamplingMode {
    /// Watch parameters for this mode.
    pub fn params(self) -> WatchParams {
        match self {
            SamplingMode::HighAccuracy => WatchParams {
                high_accuracy: true,
                timeout: Duration::from_secs(15),
                maximum_age: Duration::from_secs(5),
                min_interval: Duration::from_secs(1),
            },
            SamplingMode::PowerSave => WatchParams {
                high_accuracy: false,
                timeout: Duration::from_secs(30),
                maximum_age: Duration::from_secs(60),
                min_interval: Duration::from_secs(15),
            },
        }
    }
}

impl std::fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingMode::HighAccuracy => write!(f, "high-accuracy"),
            SamplingMode::PowerSave => write!(f, "power-save"),
        }
    }
}

/// Sampler thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub movement_threshold_m: f64,
    pub stationary: Duration,
    pub low_battery_threshold: f64,
    pub battery_poll: Duration,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        SamplerSettings {
            movement_threshold_m: 15.0,
            stationary: Duration::from_secs(60),
            low_battery_threshold: 0.2,
            battery_poll: Duration::from_secs(30),
        }
    }
}

/// Mode state machine.
#[derive(Debug, Clone)]
pub struct AdaptiveSampler {
    settings: SamplerSettings,
    mode: SamplingMode,
    /// Position of the last fix that counted as movement.
    moved_from: Option<Coordinate>,
    moved_at: Instant,
    last_known: Option<Coordinate>,
    battery_low: bool,
}

impl AdaptiveSampler {
    pub fn new(settings: SamplerSettings, now: Instant) -> Self {
        AdaptiveSampler {
            settings,
            mode: SamplingMode::HighAccuracy,
            moved_from: None,
            moved_at: now,
            last_known: None,
            battery_low: false,
        }
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// When the stationary rule fires if no movement happens first.
    /// Only meaningful in high-accuracy mode.
    pub fn stationary_deadline(&self) -> Option<Instant> {
        match self.mode {
            SamplingMode::HighAccuracy => Some(self.moved_at + self.settings.stationary),
            SamplingMode::PowerSave => None,
        }
    }

    /// Feeds a fix. Returns the new mode if it changed.
    pub fn on_fix(&mut self, coordinate: Coordinate, now: Instant) -> Option<SamplingMode> {
        let threshold = self.settings.movement_threshold_m;
        let previous = self.last_known.replace(coordinate);

        match self.mode {
            SamplingMode::HighAccuracy => {
                let moved = self
                    .moved_from
                    .is_none_or(|from| distance_m(&from, &coordinate) >= threshold);
                if moved {
                    self.moved_from = Some(coordinate);
                    self.moved_at = now;
                }
                self.on_timer(now)
            }
            SamplingMode::PowerSave => {
                let moved = previous.is_some_and(|from| distance_m(&from, &coordinate) >= threshold);
                if !moved {
                    return None;
                }
                self.moved_from = Some(coordinate);
                self.moved_at = now;
                self.switch(SamplingMode::HighAccuracy)
            }
        }
    }

    /// Feeds a battery reading. Only the transition into low while not
    /// charging forces power-save; missing telemetry never does.
    pub fn on_battery(&mut self, status: Option<BatteryStatus>) -> Option<SamplingMode> {
        let low = status.is_some_and(|s| s.is_low(self.settings.low_battery_threshold));
        let became_low = low && !self.battery_low;
        self.battery_low = low;
        if became_low && self.mode == SamplingMode::HighAccuracy {
            return self.switch(SamplingMode::PowerSave);
        }
        None
    }

    /// Applies the stationary rule at `now`.
    pub fn on_timer(&mut self, now: Instant) -> Option<SamplingMode> {
        match self.stationary_deadline() {
            Some(deadline) if now >= deadline => self.switch(SamplingMode::PowerSave),
            _ => None,
        }
    }

    fn switch(&mut self, mode: SamplingMode) -> Option<SamplingMode> {
        if self.mode == mode {
            return None;
        }
        self.mode = mode;
        Some(mode)
    }
}

/// What the sampler reports downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEvent {
    Fix { fix: PositionFix, battery: Option<BatteryStatus> },
    ModeChanged(SamplingMode),
    SourceError(SourceError),
}

/// Drives an [`AdaptiveSampler`] until `cancel` fires or `events` closes.
///
/// Each mode change opens a new watch before dropping the old one. Both feed
/// the same channel, so fixes delivered during the switch are kept.
pub async fn run_sampler<P, B>(
    source: &P,
    battery: &B,
    settings: SamplerSettings,
    events: mpsc::Sender<SamplerEvent>,
    cancel: CancellationToken,
) where
    P: PositionSource + ?Sized,
    B: BatterySource + ?Sized,
{
    match source.availability() {
        Availability::Unsupported => {
            warn!("position source unsupported, sampler not started");
            let _ = events.send(SamplerEvent::SourceError(SourceError::Unavailable)).await;
            return;
        }
        Availability::Denied => warn!("position permission denied, watching anyway"),
        Availability::Supported => {}
    }

    let (fix_tx, mut fix_rx) = mpsc::channel(64);
    let mut sampler = AdaptiveSampler::new(settings, Instant::now());
    let mut battery_status = battery.status();
    sampler.on_battery(battery_status);
    let mut guard = source.watch(sampler.mode().params(), fix_tx.clone());
    info!(mode = %sampler.mode(), "sampler started");
    if sampler.mode() != SamplingMode::HighAccuracy
        && events.send(SamplerEvent::ModeChanged(sampler.mode())).await.is_err()
    {
        return;
    }

    let mut battery_tick = tokio::time::interval_at(Instant::now() + settings.battery_poll, settings.battery_poll);

    loop {
        let before = sampler.mode();
        let deadline = sampler.stationary_deadline();

        let outgoing = tokio::select! {
            _ = cancel.cancelled() => break,
            Some(event) = fix_rx.recv() => match event {
                SourceEvent::Fix(fix) => {
                    battery_status = battery.status();
                    sampler.on_battery(battery_status);
                    sampler.on_fix(fix.coordinate, Instant::now());
                    Some(SamplerEvent::Fix { fix, battery: battery_status })
                }
                SourceEvent::Error(err) => {
                    debug!(error = %err, "position source error");
                    Some(SamplerEvent::SourceError(err))
                }
            },
            _ = battery_tick.tick() => {
                battery_status = battery.status();
                sampler.on_battery(battery_status);
                None
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                sampler.on_timer(Instant::now());
                None
            }
        };

        if let Some(event) = outgoing {
            if events.send(event).await.is_err() {
                break;
            }
        }

        let mode = sampler.mode();
        if mode != before {
            let next = source.watch(mode.params(), fix_tx.clone());
            drop(std::mem::replace(&mut guard, next));
            info!(mode = %mode, "sampling mode changed");
            if events.send(SamplerEvent::ModeChanged(mode)).await.is_err() {
                break;
            }
        }
    }

    drop(guard);
    debug!("sampler stopped");
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
