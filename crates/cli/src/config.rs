// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration management.
//!
//! Configuration is stored in `config.toml` inside the state directory and
//! has four sections:
//! - `[relay]`: relay URL and reconnect backoff
//! - `[sampler]`: movement, stationary and battery thresholds
//! - `[sync]`: durable write interval
//! - `[roll_call]`: round timeout and responder poll interval
//!
//! Every field has a default, so a missing file or section is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env;
use crate::error::{Error, Result};
use crate::sampler::SamplerSettings;
use crate::sync::ConnectionConfig;

const CONFIG_FILE_NAME: &str = "config.toml";
const STATE_DIR_NAME: &str = "fieldwatch";

/// Configuration stored in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub roll_call: RollCallConfig,
}

/// Relay connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// WebSocket URL of the relay (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum reconnection attempts per burst (0 = unlimited).
    #[serde(default)]
    pub reconnect_max_retries: u32,
    /// Maximum delay between reconnection attempts in seconds.
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    /// First backoff delay in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

/// Adaptive sampler thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Displacement that counts as movement, in meters.
    #[serde(default = "default_movement_threshold_m")]
    pub movement_threshold_m: f64,
    /// Time without movement before dropping to power-save, in seconds.
    #[serde(default = "default_stationary_secs")]
    pub stationary_secs: u64,
    /// Battery fraction under which power-save is forced.
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: f64,
    /// Battery poll period in seconds.
    #[serde(default = "default_battery_poll_secs")]
    pub battery_poll_secs: u64,
}

/// Position sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minimum time between durable writes, in seconds.
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,
}

/// Roll-call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollCallConfig {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u32,
    /// How often a participant polls for the open round, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_reconnect_max_delay_secs() -> u64 {
    30
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_movement_threshold_m() -> f64 {
    15.0
}

fn default_stationary_secs() -> u64 {
    60
}

fn default_low_battery_threshold() -> f64 {
    0.2
}

fn default_battery_poll_secs() -> u64 {
    30
}

fn default_persist_interval_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u32 {
    60
}

fn default_poll_interval_secs() -> u64 {
    3
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            url: default_url(),
            reconnect_max_retries: 0,
            reconnect_max_delay_secs: default_reconnect_max_delay_secs(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            movement_threshold_m: default_movement_threshold_m(),
            stationary_secs: default_stationary_secs(),
            low_battery_threshold: default_low_battery_threshold(),
            battery_poll_secs: default_battery_poll_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig { persist_interval_secs: default_persist_interval_secs() }
    }
}

impl Default for RollCallConfig {
    fn default() -> Self {
        RollCallConfig {
            default_timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl RelayConfig {
    /// Returns an error message if the URL is not a WebSocket URL.
    pub fn validate_url(&self) -> Option<String> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            None
        } else {
            Some(format!("invalid relay URL '{}': must start with ws:// or wss://", self.url))
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.url.clone(),
            max_retries: self.reconnect_max_retries,
            max_delay_secs: self.reconnect_max_delay_secs,
            initial_delay_ms: self.initial_delay_ms,
        }
    }
}

impl SamplerConfig {
    pub fn settings(&self) -> SamplerSettings {
        SamplerSettings {
            movement_threshold_m: self.movement_threshold_m,
            stationary: Duration::from_secs(self.stationary_secs),
            low_battery_threshold: self.low_battery_threshold,
            battery_poll: Duration::from_secs(self.battery_poll_secs.max(1)),
        }
    }
}

impl SyncConfig {
    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }
}

impl RollCallConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl Config {
    /// Loads configuration from the given state directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        let config: Config = match fs::read_to_string(&config_path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(Error::Config(format!("failed to read config: {}", e))),
        };
        config.validated()
    }

    /// Loads configuration, then applies the `FIELDWATCH_RELAY_URL` override.
    pub fn load_with_env(state_dir: &Path) -> Result<Self> {
        let mut config = Self::load(state_dir)?;
        if let Some(url) = env::relay_url() {
            config.relay.url = url;
        }
        config.validated()
    }

    fn validated(self) -> Result<Self> {
        if let Some(msg) = self.relay.validate_url() {
            return Err(Error::Config(msg));
        }
        Ok(self)
    }

    /// Saves configuration to the given state directory.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(state_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }
}

/// Resolves the state directory.
///
/// Order: the explicit `--state-dir`, `FIELDWATCH_STATE_DIR`,
/// `$XDG_STATE_HOME/fieldwatch`, then `~/.local/state/fieldwatch`.
pub fn state_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_state_dir(explicit, env::state_dir(), env::xdg_state_home(), dirs::home_dir())
}

fn resolve_state_dir(
    explicit: Option<&Path>,
    env_dir: Option<PathBuf>,
    xdg_state_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env_dir {
        return Ok(dir);
    }
    if let Some(xdg) = xdg_state_home {
        return Ok(xdg.join(STATE_DIR_NAME));
    }
    home.map(|h| h.join(".local").join("state").join(STATE_DIR_NAME))
        .ok_or_else(|| Error::Config("cannot determine state directory: no home directory".to_string()))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
