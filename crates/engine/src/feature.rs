//! Map feature snapshots as returned by surface queries.

use bevy::math::DVec2;

use crate::geometry;

/// Stable identifier for a map feature.
///
/// Real sources carry numeric ids; boundary collections without ids get
/// synthetic sequential ones assigned at load time (see `boundaries`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub u64);

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Geometry of a queried feature: a polygon outer ring or a polyline.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// Ordered outer ring of a polygon (buildings, boundaries).
    Polygon { ring: Vec<DVec2> },
    /// Ordered vertex list of a line (road centerlines).
    Line { points: Vec<DVec2> },
}

/// A snapshot of one rendered feature.
///
/// The rendering surface owns the real features; queries hand back owned
/// copies, so nothing here aliases surface internals.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub id: FeatureId,
    pub geometry: FeatureGeometry,
    /// Structural height attribute. Missing on the source means `0.0`.
    pub height: f64,
    /// Optional display name (boundary GEOIDs, street names).
    pub name: Option<String>,
}

impl MapFeature {
    pub fn polygon(id: u64, ring: Vec<DVec2>) -> Self {
        Self {
            id: FeatureId(id),
            geometry: FeatureGeometry::Polygon { ring },
            height: 0.0,
            name: None,
        }
    }

    pub fn line(id: u64, points: Vec<DVec2>) -> Self {
        Self {
            id: FeatureId(id),
            geometry: FeatureGeometry::Line { points },
            height: 0.0,
            name: None,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Polygon outer ring, if this feature is a polygon.
    pub fn ring(&self) -> Option<&[DVec2]> {
        match &self.geometry {
            FeatureGeometry::Polygon { ring } => Some(ring),
            FeatureGeometry::Line { .. } => None,
        }
    }

    /// Line vertices, if this feature is a line.
    pub fn line_points(&self) -> Option<&[DVec2]> {
        match &self.geometry {
            FeatureGeometry::Line { points } => Some(points),
            FeatureGeometry::Polygon { .. } => None,
        }
    }

    /// Footprint area (shoelace). Lines and degenerate rings are `0.0`.
    pub fn area(&self) -> f64 {
        self.ring().map_or(0.0, geometry::ring_area)
    }

    /// Anchor point used for proximity checks: the first ring/line vertex.
    ///
    /// The classification heuristics were tuned against the first vertex
    /// rather than the centroid; keep them in sync.
    pub fn anchor(&self) -> Option<DVec2> {
        match &self.geometry {
            FeatureGeometry::Polygon { ring } => ring.first().copied(),
            FeatureGeometry::Line { points } => points.first().copied(),
        }
    }

    /// Mean of the polygon ring; `None` for lines and degenerate rings.
    pub fn centroid(&self) -> Option<DVec2> {
        self.ring().and_then(geometry::ring_centroid)
    }

    /// Whether `point` falls inside this feature's polygon ring.
    pub fn contains(&self, point: DVec2) -> bool {
        self.ring()
            .is_some_and(|ring| geometry::point_in_ring(point, ring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: u64) -> MapFeature {
        MapFeature::polygon(
            id,
            vec![
                DVec2::new(0.0, 0.0),
                DVec2::new(2.0, 0.0),
                DVec2::new(2.0, 2.0),
                DVec2::new(0.0, 2.0),
            ],
        )
    }

    #[test]
    fn test_polygon_area_and_centroid() {
        let f = square(1);
        assert!((f.area() - 4.0).abs() < 1e-12);
        let c = f.centroid().unwrap();
        assert!((c - DVec2::new(1.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn test_line_has_no_area_or_centroid() {
        let f = MapFeature::line(2, vec![DVec2::ZERO, DVec2::ONE]);
        assert_eq!(f.area(), 0.0);
        assert!(f.centroid().is_none());
        assert_eq!(f.anchor(), Some(DVec2::ZERO));
    }

    #[test]
    fn test_degenerate_polygon_is_harmless() {
        let f = MapFeature::polygon(3, vec![DVec2::ZERO, DVec2::ONE]);
        assert_eq!(f.area(), 0.0);
        assert!(f.centroid().is_none());
        assert!(!f.contains(DVec2::new(0.5, 0.5)));
    }

    #[test]
    fn test_contains() {
        let f = square(4);
        assert!(f.contains(DVec2::new(1.0, 1.0)));
        assert!(!f.contains(DVec2::new(3.0, 1.0)));
    }
}
