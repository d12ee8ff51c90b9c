//! Administrative boundary loading from GeoJSON.
//!
//! Boundary collections arrive as GeoJSON FeatureCollections of polygons.
//! Features rarely carry usable ids, so sequential synthetic ids are
//! assigned at load time; highlight lookups go by display name instead.

use bevy::math::DVec2;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::feature::MapFeature;
use crate::geometry;

/// Property keys probed, in order, for a boundary's display name.
const NAME_KEYS: [&str; 3] = ["GEOID", "GEOID20", "name"];

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("invalid boundary JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("expected a FeatureCollection, got '{0}'")]
    NotACollection(String),
    #[error("unsupported geometry type '{0}'")]
    UnsupportedGeometry(String),
    #[error("malformed coordinates in feature {0}")]
    MalformedCoordinates(usize),
}

#[derive(Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<RawFeature>,
}

#[derive(Deserialize)]
struct RawFeature {
    // GeoJSON allows a null geometry member; such features are skipped.
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct RawGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Value,
}

/// Parse a FeatureCollection of Polygon / MultiPolygon boundaries.
///
/// Synthetic ids are assigned sequentially starting at `first_id`; pick
/// disjoint ranges per collection so ids never collide across sources.
/// MultiPolygons keep only their largest outer ring, which is what hover
/// hit-testing and highlighting actually use.
pub fn parse_boundaries(json: &str, first_id: u64) -> Result<Vec<MapFeature>, BoundaryError> {
    let collection: RawCollection = serde_json::from_str(json)?;
    if collection.kind != "FeatureCollection" {
        return Err(BoundaryError::NotACollection(collection.kind));
    }

    let mut out = Vec::with_capacity(collection.features.len());
    let mut next_id = first_id;
    for (index, raw) in collection.features.into_iter().enumerate() {
        let Some(geometry) = raw.geometry else {
            continue;
        };
        let ring = match geometry.kind.as_str() {
            "Polygon" => outer_ring(&geometry.coordinates)
                .ok_or(BoundaryError::MalformedCoordinates(index))?,
            "MultiPolygon" => largest_outer_ring(&geometry.coordinates)
                .ok_or(BoundaryError::MalformedCoordinates(index))?,
            other => return Err(BoundaryError::UnsupportedGeometry(other.to_string())),
        };
        let mut feature = MapFeature::polygon(next_id, ring);
        next_id += 1;
        if let Some(name) = display_name(&raw.properties) {
            feature = feature.with_name(name);
        }
        out.push(feature);
    }
    Ok(out)
}

fn display_name(properties: &serde_json::Map<String, Value>) -> Option<String> {
    NAME_KEYS.iter().find_map(|key| match properties.get(*key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First ring of a Polygon coordinate array.
fn outer_ring(coordinates: &Value) -> Option<Vec<DVec2>> {
    parse_ring(coordinates.as_array()?.first()?)
}

/// Largest-area outer ring across a MultiPolygon's members.
fn largest_outer_ring(coordinates: &Value) -> Option<Vec<DVec2>> {
    coordinates
        .as_array()?
        .iter()
        .filter_map(outer_ring)
        .max_by(|a, b| geometry::ring_area(a).total_cmp(&geometry::ring_area(b)))
}

fn parse_ring(value: &Value) -> Option<Vec<DVec2>> {
    let positions = value.as_array()?;
    let mut ring = Vec::with_capacity(positions.len());
    for position in positions {
        let coords = position.as_array()?;
        // Positions may carry altitude as a third element; ignore it.
        let x = coords.first()?.as_f64()?;
        let y = coords.get(1)?.as_f64()?;
        ring.push(DVec2::new(x, y));
    }
    Some(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureId;

    const TWO_TRACTS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"GEOID": "36061000100"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Riverside"},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[5.0, 5.0], [5.1, 5.0], [5.1, 5.1], [5.0, 5.0]]],
                        [[[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0], [2.0, 2.0]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_assigns_sequential_ids_and_names() {
        let features = parse_boundaries(TWO_TRACTS, 1000).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, FeatureId(1000));
        assert_eq!(features[1].id, FeatureId(1001));
        assert_eq!(features[0].name.as_deref(), Some("36061000100"));
        assert_eq!(features[1].name.as_deref(), Some("Riverside"));
    }

    #[test]
    fn test_multipolygon_keeps_largest_ring() {
        let features = parse_boundaries(TWO_TRACTS, 0).unwrap();
        // The second member polygon is the larger one.
        assert!(features[1].contains(DVec2::new(3.0, 3.0)));
        assert!(!features[1].contains(DVec2::new(5.05, 5.02)));
    }

    #[test]
    fn test_numeric_name_property_is_stringified() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"GEOID": 42},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[0,1],[0,0]]]}
            }]
        }"#;
        let features = parse_boundaries(json, 0).unwrap();
        assert_eq!(features[0].name.as_deref(), Some("42"));
    }

    #[test]
    fn test_null_geometry_is_skipped() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "ghost"}, "geometry": null},
                {
                    "type": "Feature",
                    "properties": {"name": "real"},
                    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[0,1],[0,0]]]}
                }
            ]
        }"#;
        let features = parse_boundaries(json, 50).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, FeatureId(50));
        assert_eq!(features[0].name.as_deref(), Some("real"));
    }

    #[test]
    fn test_rejects_non_collections() {
        let err = parse_boundaries(r#"{"type": "Feature", "features": []}"#, 0).unwrap_err();
        assert!(matches!(err, BoundaryError::NotACollection(_)));
    }

    #[test]
    fn test_rejects_unsupported_geometry() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [0, 0]}
            }]
        }"#;
        let err = parse_boundaries(json, 0).unwrap_err();
        assert!(matches!(err, BoundaryError::UnsupportedGeometry(t) if t == "Point"));
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        assert!(matches!(
            parse_boundaries("{nope", 0).unwrap_err(),
            BoundaryError::Parse(_)
        ));
    }
}
