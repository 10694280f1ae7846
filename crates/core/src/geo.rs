// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinates and great-circle distance.
//!
//! Distances use the haversine formula on a sphere of radius 6371 km. The
//! longitude difference only ever enters through `sin²(Δλ/2)`, which is
//! periodic, so points either side of the ±180° meridian come out close
//! together without any wrapping logic.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius used for all distance computations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting NaN and infinite components.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(Error::InvalidCoordinate { lat: latitude, lng: longitude });
        }
        Ok(Coordinate { latitude, longitude })
    }

    /// Distance to another coordinate in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(self, other)
    }
}

/// Haversine great-circle distance in kilometers.
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let dphi = (b.latitude - a.latitude).to_radians();
    let dlambda = (b.longitude - a.longitude).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1.0 for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Haversine great-circle distance in meters.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    distance_km(a, b) * 1000.0
}

#[cfg(test)]
#[path = "geo_tests.rs"]
mod tests;
