// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for fw-core operations.

use thiserror::Error;

/// All possible errors that can occur in fw-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid coordinate: latitude {lat}, longitude {lng}\n  hint: both values must be finite numbers")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid battery level: {0}\n  hint: battery level is a fraction between 0.0 and 1.0")]
    InvalidBatteryLevel(f64),

    #[error("invalid radius: {0} km\n  hint: the safe radius must be a positive finite number")]
    InvalidRadius(f64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for fw-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
