use geo::Point;

use crate::models::BoundingBox;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Haversine distance between two `geo` points (x = longitude, y = latitude)
#[inline]
pub fn distance_between(from: Point<f64>, to: Point<f64>) -> f64 {
    haversine_distance(from.y(), from.x(), to.y(), to.x())
}

/// Round to one decimal, the precision distances are displayed with
#[inline]
pub fn round_km(distance_km: f64) -> f64 {
    (distance_km * 10.0).round() / 10.0
}

/// Calculate a bounding box around a center point
///
/// Used as a cheap pre-filter before the exact Haversine cutoff.
/// 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude)
///
/// Longitudes stay within ±180°. A box crossing the antimeridian comes back
/// with `min_lon > max_lon`; a box reaching a pole spans every longitude.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / 111.0;
    let min_lat = (lat - lat_delta).max(-90.0);
    let max_lat = (lat + lat_delta).min(90.0);

    // Near the poles cos() approaches zero; clamp so the division stays finite
    let lon_delta = radius_km / (111.0 * lat.to_radians().cos().abs().max(1e-6));

    if min_lat <= -90.0 || max_lat >= 90.0 || lon_delta >= 180.0 {
        return BoundingBox {
            min_lat,
            max_lat,
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon: wrap_longitude(lon - lon_delta),
        max_lon: wrap_longitude(lon + lon_delta),
    }
}

#[inline]
fn wrap_longitude(lon: f64) -> f64 {
    if lon < -180.0 {
        lon + 360.0
    } else if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    let lon_inside = if bbox.crosses_antimeridian() {
        lon >= bbox.min_lon || lon <= bbox.max_lon
    } else {
        lon >= bbox.min_lon && lon <= bbox.max_lon
    };

    lat >= bbox.min_lat && lat <= bbox.max_lat && lon_inside
}
