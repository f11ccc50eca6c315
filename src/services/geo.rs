//! Geographic calculations used for fallback estimates

use crate::types::Coordinates;

/// Mean Earth radius in meters (IUGG)
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Floor for the fallback speed so ETA division never blows up
const MIN_SPEED_MPS: f64 = 1e-6;

/// Great-circle distance in meters (haversine)
pub fn haversine_m(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Haversine distance rounded to the nearest meter, ties to even
pub fn haversine_rounded_m(from: &Coordinates, to: &Coordinates) -> u64 {
    haversine_m(from, to).round_ties_even() as u64
}

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * 1000.0 / 3600.0
}

/// Fallback ETA in seconds for a straight-line distance, at least 1 s.
/// Half seconds round to even.
pub fn fallback_eta_secs(distance_m: u64, speed_kmh: f64) -> u64 {
    let mps = kmh_to_mps(speed_kmh).max(MIN_SPEED_MPS);
    ((distance_m as f64 / mps).round_ties_even() as u64).max(1)
}
