//! Small geodesy helpers shared by the matcher, dead reckoning and fusion.

use geo::{HaversineDistance, Point};

use crate::types::LatLng;

/// Degrees of latitude per metre walked north (local small-step approximation).
pub const LAT_DEG_PER_METER: f64 = 0.000009;
/// Degrees of longitude per metre walked east at the surveyed site's latitude.
pub const LNG_DEG_PER_METER: f64 = 0.000016;

/// Sea-level standard atmosphere, hPa.
pub const PRESSURE_STANDARD_ATMOSPHERE: f64 = 1013.25;

/// Great-circle distance in metres.
pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    let pa = Point::new(a.lng, a.lat);
    let pb = Point::new(b.lng, b.lat);
    pa.haversine_distance(&pb)
}

/// Move `origin` by `distance` metres along `heading_deg` (0 = north, clockwise).
///
/// Equirectangular step with fixed per-axis scales; only valid for steps of a
/// few metres, which is all dead reckoning ever produces.
pub fn offset_by_step(origin: LatLng, heading_deg: f64, distance: f64) -> LatLng {
    let heading = heading_deg.to_radians();
    LatLng::new(
        origin.lat + heading.cos() * LAT_DEG_PER_METER * distance,
        origin.lng + heading.sin() * LNG_DEG_PER_METER * distance,
    )
}

/// Linear interpolation from `from` toward `to`; `weight` 1.0 lands on `to`.
pub fn interpolate(from: LatLng, to: LatLng, weight: f64) -> LatLng {
    LatLng::new(
        from.lat + (to.lat - from.lat) * weight,
        from.lng + (to.lng - from.lng) * weight,
    )
}

/// Standard barometric formula: altitude in metres for `pressure` relative to `reference`.
pub fn pressure_to_altitude(reference_hpa: f64, pressure_hpa: f64) -> f64 {
    const COEF: f64 = 1.0 / 5.255;
    44330.0 * (1.0 - (pressure_hpa / reference_hpa).powf(COEF))
}

/// Wrap an angle in degrees into [0, 360).
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}
