// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn c(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).unwrap()
}

#[test]
fn same_point_is_exactly_zero() {
    let rome = c(41.9028, 12.4964);
    assert_eq!(distance_km(&rome, &rome), 0.0);
}

#[parameterized(
    rome_florence = { 41.9028, 12.4964, 43.7696, 11.2558, 231.0, 1.0 },
    milan_naples = { 45.4654, 9.1859, 40.8518, 14.2681, 658.0, 1.0 },
    equator_one_degree = { 0.0, 0.0, 0.0, 1.0, 111.2, 0.1 },
    antimeridian = { 0.0, 179.5, 0.0, -179.5, 111.2, 0.1 },
)]
fn known_distances(lat1: f64, lng1: f64, lat2: f64, lng2: f64, expected: f64, tolerance: f64) {
    let d = distance_km(&c(lat1, lng1), &c(lat2, lng2));
    assert!((d - expected).abs() <= tolerance, "got {d}, expected {expected}±{tolerance}");
}

#[parameterized(
    rome_florence = { 41.9028, 12.4964, 43.7696, 11.2558 },
    across_seam = { -12.0, 179.9, 14.0, -179.2 },
    near_pole = { 89.95, -30.0, 89.90, 150.0 },
    southern = { -33.8688, 151.2093, -37.8136, 144.9631 },
)]
fn distance_is_symmetric(lat1: f64, lng1: f64, lat2: f64, lng2: f64) {
    let a = c(lat1, lng1);
    let b = c(lat2, lng2);
    let ab = distance_km(&a, &b);
    let ba = distance_km(&b, &a);
    assert!((ab - ba).abs() <= 1e-6 * ab.max(1.0));
}

#[test]
fn polar_points_on_opposite_meridians_are_close() {
    let d = distance_km(&c(89.9, 0.0), &c(89.9, 180.0));
    assert!(d > 0.0);
    assert!(d < 30.0);
}

#[test]
fn antipodal_points_are_half_circumference() {
    let d = distance_km(&c(0.0, 0.0), &c(0.0, 180.0));
    let half = std::f64::consts::PI * EARTH_RADIUS_KM;
    assert!((d - half).abs() < 1e-6);
}

#[test]
fn movement_threshold_scale() {
    let origin = c(41.9028, 12.4964);
    // ~11 m north stays under 15 m, ~55 m north is well over it
    assert!(distance_m(&origin, &c(41.90290, 12.4964)) < 15.0);
    assert!(distance_m(&origin, &c(41.90330, 12.4964)) > 15.0);
}

#[parameterized(
    nan_lat = { f64::NAN, 0.0 },
    inf_lng = { 0.0, f64::INFINITY },
    neg_inf_lat = { f64::NEG_INFINITY, 10.0 },
)]
fn rejects_non_finite(lat: f64, lng: f64) {
    assert!(matches!(Coordinate::new(lat, lng), Err(Error::InvalidCoordinate { .. })));
}
