//! Geodesic helpers

use crate::attributes::keys;
use crate::position::Position;

/// Mean earth radius (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Distance travelled between two consecutive reports (meters)
///
/// Prefers the odometer delta when both reports carry one; falls back
/// to the straight-line distance otherwise or when the odometer went
/// backwards (device reset).
pub fn segment_distance(last: &Position, position: &Position) -> f64 {
    if let (Some(old), Some(new)) = (
        last.double(keys::TOTAL_DISTANCE),
        position.double(keys::TOTAL_DISTANCE),
    ) {
        if new >= old {
            return new - old;
        }
    }
    haversine_distance(last.latitude, last.longitude, position.latitude, position.longitude)
}
