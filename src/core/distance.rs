use serde::Deserialize;

use crate::models::{BoundingBox, Coordinates};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_MILE: f64 = 1.609_344;

/// Unit in which callers express `max_distance`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Km,
    #[serde(alias = "mi")]
    Miles,
}

impl DistanceUnit {
    #[inline]
    pub fn to_km(self, value: f64) -> f64 {
        match self {
            DistanceUnit::Km => value,
            DistanceUnit::Miles => value * KM_PER_MILE,
        }
    }
}

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers on a sphere of radius [`EARTH_RADIUS_KM`]
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_with_radius(lat1, lon1, lat2, lon2, EARTH_RADIUS_KM)
}

/// Haversine distance between two coordinates on a sphere of `radius_km`
#[inline]
pub fn great_circle_km(from: Coordinates, to: Coordinates, radius_km: f64) -> f64 {
    haversine_with_radius(from.latitude, from.longitude, to.latitude, to.longitude, radius_km)
}

#[inline]
fn haversine_with_radius(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius_km: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    radius_km * c
}

/// Calculate a bounding box around a center point
///
/// Used as a coarse store-side pre-filter; exact distances are always
/// recomputed with Haversine afterwards.
/// 1° latitude ≈ 111km, 1° longitude ≈ 111km * cos(latitude)
///
/// Near the poles, or when the box would wrap the antimeridian, the
/// longitude span widens to the full [-180, 180] range.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / 111.0;
    let min_lat = (lat - lat_delta).max(-90.0);
    let max_lat = (lat + lat_delta).min(90.0);

    let cos_lat = lat.to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-6 {
        f64::INFINITY
    } else {
        radius_km / (111.0 * cos_lat)
    };

    let (min_lon, max_lon) = if max_lat >= 90.0 || min_lat <= -90.0 || lon_delta >= 180.0 {
        (-180.0, 180.0)
    } else if lon - lon_delta < -180.0 || lon + lon_delta > 180.0 {
        (-180.0, 180.0)
    } else {
        (lon - lon_delta, lon + lon_delta)
    };

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

/// Outcome of the distance stage for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceVerdict {
    /// Keep, with the distance in km when both parties are located
    Keep(Option<f64>),
    Drop,
}

/// Apply the max-distance policy to one candidate.
///
/// * requester unlocated: the filter cannot be evaluated, keep without distance
/// * candidate unlocated: dropped only while a max distance is set
/// * both located: dropped when strictly farther than `max_km`
pub fn evaluate(
    origin: Option<Coordinates>,
    target: Option<Coordinates>,
    max_km: Option<f64>,
    radius_km: f64,
) -> DistanceVerdict {
    let Some(origin) = origin else {
        return DistanceVerdict::Keep(None);
    };
    let Some(target) = target else {
        return if max_km.is_some() {
            DistanceVerdict::Drop
        } else {
            DistanceVerdict::Keep(None)
        };
    };

    let distance = great_circle_km(origin, target, radius_km);
    match max_km {
        Some(max) if distance > max => DistanceVerdict::Drop,
        _ => DistanceVerdict::Keep(Some(distance)),
    }
}

/// Round a distance for display
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // London to Paris, approximately 344 km
        let distance = haversine_distance(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((distance - 344.0).abs() < 10.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_great_circle_uses_radius() {
        let a = Coordinates::new(0.0, 0.0).unwrap();
        let b = Coordinates::new(0.0, 1.0).unwrap();

        let default = great_circle_km(a, b, EARTH_RADIUS_KM);
        let doubled = great_circle_km(a, b, EARTH_RADIUS_KM * 2.0);
        assert!((doubled - default * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_miles_conversion() {
        assert_eq!(DistanceUnit::Km.to_km(50.0), 50.0);
        assert!((DistanceUnit::Miles.to_km(50.0) - 80.4672).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        assert!(bbox.min_lat < 40.7128);
        assert!(bbox.max_lat > 40.7128);
        assert!(bbox.min_lon < -74.0060);
        assert!(bbox.max_lon > -74.0060);

        // 20km / 111km per degree = ~0.18 degrees
        let lat_span = bbox.max_lat - bbox.min_lat;
        assert!((lat_span - 0.18).abs() < 0.02, "Lat span should be ~0.18 degrees");
    }

    #[test]
    fn test_bounding_box_near_pole_spans_all_longitudes() {
        let bbox = calculate_bounding_box(89.9, 10.0, 50.0);
        assert_eq!(bbox.max_lat, 90.0);
        assert_eq!(bbox.min_lon, -180.0);
        assert_eq!(bbox.max_lon, 180.0);
    }

    #[test]
    fn test_bounding_box_across_antimeridian() {
        let bbox = calculate_bounding_box(0.0, 179.9, 100.0);
        assert!(is_within_bounding_box(0.0, -179.9, &bbox));
    }

    #[test]
    fn test_point_within_bbox() {
        let bbox = calculate_bounding_box(40.7128, -74.0060, 10.0);

        assert!(is_within_bounding_box(40.7128, -74.0060, &bbox));
        assert!(is_within_bounding_box(40.71, -74.0, &bbox));
        assert!(!is_within_bounding_box(50.0, -80.0, &bbox));
    }

    #[test]
    fn test_evaluate_missing_location_policy() {
        let nyc = Coordinates::new(40.7128, -74.0060);

        assert_eq!(evaluate(nyc, None, None, EARTH_RADIUS_KM), DistanceVerdict::Keep(None));
        assert_eq!(evaluate(nyc, None, Some(50.0), EARTH_RADIUS_KM), DistanceVerdict::Drop);
        assert_eq!(evaluate(None, nyc, Some(50.0), EARTH_RADIUS_KM), DistanceVerdict::Keep(None));
    }

    #[test]
    fn test_evaluate_max_distance() {
        let nyc = Coordinates::new(40.7128, -74.0060);
        let philly = Coordinates::new(39.9526, -75.1652);

        assert_eq!(evaluate(nyc, philly, Some(50.0), EARTH_RADIUS_KM), DistanceVerdict::Drop);
        match evaluate(nyc, philly, Some(200.0), EARTH_RADIUS_KM) {
            DistanceVerdict::Keep(Some(d)) => assert!((d - 130.0).abs() < 10.0, "got {}", d),
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(12.35, 0), 12.0);
    }
}
