//! Geofence geometry evaluation.

use geo::{Contains, Geometry, Point};
use thiserror::Error;

/// Geometry parse/shape errors. A malformed geofence is skipped for the
/// telemetry event being processed, never fatal.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("invalid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),

    #[error("GeoJSON value is not a bare geometry")]
    NotAGeometry,
}

/// Parse the stored GeoJSON geometry of a geofence.
pub fn parse_geometry(value: &serde_json::Value) -> Result<Geometry<f64>, GeoError> {
    match geojson::GeoJson::from_json_value(value.clone())? {
        geojson::GeoJson::Geometry(geometry) => Ok(Geometry::try_from(geometry)?),
        _ => Err(GeoError::NotAGeometry),
    }
}

/// Validate the geometry of a geofence about to be stored.
///
/// Called by the creation path before anything reaches the store: a
/// geometry that fails to parse here would otherwise be persisted and
/// then silently skipped on every telemetry event, disabling the
/// geofence forever.
pub fn validate_before_create(new: &convoy_db::NewGeofence) -> Result<(), GeoError> {
    parse_geometry(&new.data).map(|_| ())
}

/// Whether the point `(lon, lat)` lies inside the geometry.
pub fn contains(geometry: &Geometry<f64>, lon: f64, lat: f64) -> bool {
    geometry.contains(&Point::new(lon, lat))
}

/// Boundary-crossing test between the previous and current position.
///
/// Positions are `(lon, lat)`; a missing previous position counts as
/// outside. Returns `Some(entered)` when the containment state changed,
/// `None` otherwise.
pub fn crossing(
    geometry: &Geometry<f64>,
    prev: Option<(f64, f64)>,
    current: (f64, f64),
) -> Option<bool> {
    let curr_inside = contains(geometry, current.0, current.1);
    let prev_inside = prev.is_some_and(|(lon, lat)| contains(geometry, lon, lat));

    (curr_inside != prev_inside).then_some(curr_inside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit_square() -> Geometry<f64> {
        parse_geometry(&json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
        }))
        .unwrap()
    }

    #[test]
    fn test_containment() {
        let square = unit_square();
        assert!(contains(&square, 0.5, 0.5));
        assert!(!contains(&square, 2.0, 0.5));
    }

    #[test]
    fn test_crossing_outside_to_inside() {
        let square = unit_square();
        assert_eq!(crossing(&square, Some((2.0, 2.0)), (0.5, 0.5)), Some(true));
    }

    #[test]
    fn test_crossing_inside_to_outside() {
        let square = unit_square();
        assert_eq!(crossing(&square, Some((0.5, 0.5)), (2.0, 2.0)), Some(false));
    }

    #[test]
    fn test_no_crossing_when_state_unchanged() {
        let square = unit_square();
        assert_eq!(crossing(&square, Some((0.4, 0.4)), (0.6, 0.6)), None);
        assert_eq!(crossing(&square, Some((2.0, 2.0)), (3.0, 3.0)), None);
    }

    #[test]
    fn test_missing_previous_counts_as_outside() {
        let square = unit_square();
        assert_eq!(crossing(&square, None, (0.5, 0.5)), Some(true));
        assert_eq!(crossing(&square, None, (2.0, 2.0)), None);
    }

    #[test]
    fn test_malformed_geometry_is_an_error() {
        assert!(parse_geometry(&json!({"type": "Nonsense"})).is_err());
        assert!(parse_geometry(&json!({"type": "FeatureCollection", "features": []})).is_err());
    }
}
