//! Great-circle distance on a spherical Earth.

use geo::{Distance, Haversine};

use crate::models::GeoPoint;

/// Mean Earth radius in kilometers (IUGG)
pub const EARTH_RADIUS_KM: f64 = 6371.009;

/// Central-angle great-circle distance in kilometers.
///
/// Uses the atan2 form, which stays accurate for both very short and
/// near-antipodal separations.
pub fn great_circle_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());

    let (sin_lat1, cos_lat1) = lat1.sin_cos();
    let (sin_lat2, cos_lat2) = lat2.sin_cos();
    let (sin_dlon, cos_dlon) = (lon2 - lon1).sin_cos();

    let y = ((cos_lat2 * sin_dlon).powi(2)
        + (cos_lat1 * sin_lat2 - sin_lat1 * cos_lat2 * cos_dlon).powi(2))
    .sqrt();
    let x = sin_lat1 * sin_lat2 + cos_lat1 * cos_lat2 * cos_dlon;

    EARTH_RADIUS_KM * y.atan2(x)
}

/// Haversine distance in kilometers, via `geo`.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    Haversine.distance(a.to_point(), b.to_point()) / 1000.0
}
