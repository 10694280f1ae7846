// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection establishment with exponential backoff.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::Transport;

pub const STATE_DISCONNECTED: u8 = 0;
pub const STATE_CONNECTING: u8 = 1;
pub const STATE_CONNECTED: u8 = 2;

/// Pause after a burst of `max_retries` failed attempts before trying again.
pub const RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Connection state shared between the client task and its handles.
///
/// Atomic fields so handles can check connectivity without a round trip.
#[derive(Debug)]
pub struct SharedConnectionState {
    state: AtomicU8,
    attempt: AtomicU32,
}

impl SharedConnectionState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_DISCONNECTED),
            attempt: AtomicU32::new(0),
        }
    }

    pub fn get(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    pub fn set(&self, state: u8) {
        self.state.store(state, Ordering::Release);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Acquire)
    }

    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.get() == STATE_CONNECTED
    }

    pub fn is_connecting(&self) -> bool {
        self.get() == STATE_CONNECTING
    }

    pub fn status_string(&self) -> String {
        match self.get() {
            STATE_DISCONNECTED => "disconnected".to_string(),
            STATE_CONNECTING => match self.attempt() {
                0 => "connecting".to_string(),
                n => format!("connecting (attempt {})", n),
            },
            STATE_CONNECTED => "connected".to_string(),
            _ => "unknown".to_string(),
        }
    }
}

impl Default for SharedConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: String,
    /// Attempts per burst before pausing for [`RETRY_PAUSE`] (0 = unlimited).
    pub max_retries: u32,
    /// Backoff ceiling in seconds.
    pub max_delay_secs: u64,
    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:7890".to_string(),
            max_retries: 0,
            max_delay_secs: 30,
            initial_delay_ms: 100,
        }
    }
}

/// Backoff delay after `delay_ms`, doubled and capped.
pub fn next_delay_ms(delay_ms: u64, max_delay_secs: u64) -> u64 {
    std::cmp::min(delay_ms.saturating_mul(2), max_delay_secs.saturating_mul(1000))
}

/// Connects a fresh transport from `make_transport`, retrying until it
/// succeeds. Returns `None` only when `cancel` fires.
pub async fn connect_with_retry<T, F>(
    make_transport: &mut F,
    config: &ConnectionConfig,
    shared_state: &SharedConnectionState,
    cancel: &CancellationToken,
) -> Option<T>
where
    T: Transport,
    F: FnMut() -> T,
{
    let mut attempt = 0u32;
    let mut delay_ms = config.initial_delay_ms;

    loop {
        if cancel.is_cancelled() {
            shared_state.set(STATE_DISCONNECTED);
            return None;
        }

        attempt = attempt.saturating_add(1);
        shared_state.set(STATE_CONNECTING);
        shared_state.set_attempt(attempt);

        let mut transport = make_transport();
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                shared_state.set(STATE_DISCONNECTED);
                return None;
            }
            result = transport.connect(&config.url) => result,
        };

        let error = match result {
            Ok(()) => {
                shared_state.set(STATE_CONNECTED);
                shared_state.set_attempt(0);
                info!(url = %config.url, attempt, "connected to relay");
                return Some(transport);
            }
            Err(e) => e,
        };

        let wait = if config.max_retries > 0 && attempt >= config.max_retries {
            warn!(attempts = attempt, error = %error, "relay unreachable, pausing before retrying");
            attempt = 0;
            delay_ms = config.initial_delay_ms;
            RETRY_PAUSE
        } else {
            debug!(attempt, error = %error, delay_ms, "connect failed");
            let wait = Duration::from_millis(delay_ms);
            delay_ms = next_delay_ms(delay_ms, config.max_delay_secs);
            wait
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                shared_state.set(STATE_DISCONNECTED);
                return None;
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
