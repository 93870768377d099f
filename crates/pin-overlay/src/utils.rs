//! Utility functions for coordinate conversions, map levels and distances

use geo::Point;

/// Web Mercator bounds in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;
pub const EARTH_MERCATOR_MIN: f64 = -20037508.34;
pub const EARTH_SIZE_METERS: f64 = EARTH_MERCATOR_MAX - EARTH_MERCATOR_MIN;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

/// Earth's mean radius in meters
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Side of a map tile in pixels
pub const TILE_SIZE_PX: f64 = 256.0;

/// Slippy-map zoom equivalent to map level 0
///
/// Level 1 (street view) maps to zoom 19 and every level out halves the scale.
pub const LEVEL_ZERO_ZOOM: f64 = 20.0;

/// Closest and farthest map levels
pub const MIN_MAP_LEVEL: i32 = 1;
pub const MAX_MAP_LEVEL: i32 = 14;

/// Precomputed constant: EARTH_MERCATOR_MAX / 180.0
const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;

/// Precomputed constant: EARTH_MERCATOR_MAX / PI
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters
///
/// # Arguments
/// * `lat` - Latitude in degrees (-85.05 to 85.05)
/// * `lon` - Longitude in degrees (-180 to 180)
///
/// # Returns
/// A `Point<f64>` with x (easting) and y (northing) in meters
#[inline(always)]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> Point<f64> {
    // Clamp latitude to valid Web Mercator range
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

    let x = lon * LON_TO_X_FACTOR;

    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;

    Point::new(x, y)
}

/// Convert a map level to the equivalent fractional slippy-map zoom
#[inline]
pub fn level_to_zoom(level: i32) -> f64 {
    LEVEL_ZERO_ZOOM - level as f64
}

/// Convert a slippy-map zoom (larger = closer) to a map level (larger = farther)
///
/// The result is rounded to the nearest level and clamped to
/// [`MIN_MAP_LEVEL`]..=[`MAX_MAP_LEVEL`].
#[inline]
pub fn zoom_to_level(zoom: f64) -> i32 {
    if !zoom.is_finite() {
        return MAX_MAP_LEVEL;
    }
    ((LEVEL_ZERO_ZOOM - zoom).round() as i32).clamp(MIN_MAP_LEVEL, MAX_MAP_LEVEL)
}

/// Project WGS84 coordinates to world pixel coordinates at a map level
///
/// The origin is the north-west corner of the Web Mercator square, with y growing south.
#[inline]
pub fn world_pixel(lat: f64, lon: f64, level: i32) -> Point<f64> {
    let mercator = wgs84_to_mercator(lat, lon);
    let world_size = TILE_SIZE_PX * level_to_zoom(level).exp2();

    let x = (mercator.x() - EARTH_MERCATOR_MIN) / EARTH_SIZE_METERS * world_size;
    let y = (EARTH_MERCATOR_MAX - mercator.y()) / EARTH_SIZE_METERS * world_size;
    Point::new(x, y)
}

/// Calculate the Haversine distance between two (lat, lon) pairs in meters
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Meters per degree of latitude on the Haversine sphere
pub const METERS_PER_DEGREE_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_to_mercator_origin() {
        let point = wgs84_to_mercator(0.0, 0.0);
        assert!((point.x() - 0.0).abs() < 0.01);
        assert!((point.y() - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_wgs84_to_mercator_bounds() {
        let west = wgs84_to_mercator(0.0, -180.0);
        assert!((west.x() - EARTH_MERCATOR_MIN).abs() < 1.0);

        let east = wgs84_to_mercator(0.0, 180.0);
        assert!((east.x() - EARTH_MERCATOR_MAX).abs() < 1.0);
    }

    #[test]
    fn test_zoom_level_conversion() {
        assert_eq!(zoom_to_level(19.0), 1);
        assert_eq!(zoom_to_level(16.4), 4);
        assert_eq!(zoom_to_level(25.0), MIN_MAP_LEVEL);
        assert_eq!(zoom_to_level(0.0), MAX_MAP_LEVEL);
        assert_eq!(zoom_to_level(f64::NAN), MAX_MAP_LEVEL);
        assert_eq!(level_to_zoom(3), 17.0);
    }

    #[test]
    fn test_world_pixel_scales_with_level() {
        let near = world_pixel(37.5, 127.0, 3);
        let far = world_pixel(37.5, 127.0, 4);
        // One level out halves the pixel scale
        assert!((near.x() / far.x() - 2.0).abs() < 1e-9);
        assert!((near.y() / far.y() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_world_pixel_origin_is_north_west() {
        let nw = world_pixel(MAX_LATITUDE, -180.0, MAX_MAP_LEVEL);
        assert!(nw.x().abs() < 1e-6);
        assert!(nw.y().abs() < 1e-3);
    }

    #[test]
    fn test_haversine_distance() {
        assert_eq!(haversine_distance(37.5, 127.0, 37.5, 127.0), 0.0);

        // 0.0001 degrees of latitude is about 11 meters
        let d = haversine_distance(37.5, 127.0, 37.5001, 127.0);
        assert!(d > 10.0 && d < 12.5, "unexpected distance {d}");
    }
}
