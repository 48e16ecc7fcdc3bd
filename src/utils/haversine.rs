//! Great-circle distance (spec §4.3).

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) =
        (lat1.to_radians(), lon1.to_radians(), lat2.to_radians(), lon2.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// A bounding box generous enough to contain every point within `radius_km`
/// of `(lat, lon)`. Used to cheaply pre-filter rows in SQL before the exact
/// Haversine check.
pub fn bounding_box_for_radius(lat: f64, lon: f64, radius_km: f64) -> (f64, f64, f64, f64) {
    let lat_delta = radius_km / 111.0;
    let lon_delta = radius_km / (111.0 * lat.to_radians().cos().abs().max(0.01));

    (
        (lat - lat_delta).max(-90.0),
        (lat + lat_delta).min(90.0),
        (lon - lon_delta).max(-180.0),
        (lon + lon_delta).min(180.0),
    )
}
