//! Spherical helpers for direction and distance between cell centers.

use crate::model::cell::LatLng;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial great-circle bearing from `from` to `to` in degrees, `[0, 360)`,
/// where 0 is geographic north and angles grow clockwise.
pub fn initial_bearing_deg(from: LatLng, to: LatLng) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_lambda = (to.lng - from.lng).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    normalize_deg(y.atan2(x).to_degrees())
}

/// Haversine distance in kilometres.
pub fn great_circle_distance_km(from: LatLng, to: LatLng) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let delta_phi = (to.lat - from.lat).to_radians();
    let delta_lambda = (to.lng - from.lng).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Maps any finite angle into `[0, 360)`.
pub fn normalize_deg(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
pub fn angular_distance_deg(a: f64, b: f64) -> f64 {
    let diff = normalize_deg(a - b);
    diff.min(360.0 - diff)
}
