//! Planar geometry helpers over lon/lat coordinates.
//!
//! Everything here treats coordinates as points on a flat plane measured in
//! raw degrees. That is wrong on a globe, but all inputs are confined to a
//! single city's bounding box where the distortion is negligible, and the
//! original heuristics were tuned against exactly this metric. Do not swap
//! in geodesic math without retuning every radius/falloff constant.

use bevy::math::DVec2;

/// Polygon ring area via the shoelace formula.
///
/// Rings with fewer than 3 points are degenerate and yield `0.0`. The ring
/// may be open or closed; a duplicated closing vertex contributes nothing.
pub fn ring_area(ring: &[DVec2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for pair in ring.windows(2) {
        area += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    // Close the ring explicitly in case the input is open.
    let first = ring[0];
    let last = ring[ring.len() - 1];
    area += last.x * first.y - first.x * last.y;
    area.abs() / 2.0
}

/// Coordinate-wise mean of a polygon ring.
///
/// Returns `None` for degenerate rings (fewer than 3 points) so callers
/// exclude the feature instead of flowing NaN/garbage downstream.
pub fn ring_centroid(ring: &[DVec2]) -> Option<DVec2> {
    if ring.len() < 3 {
        return None;
    }
    let sum: DVec2 = ring.iter().copied().sum();
    Some(sum / ring.len() as f64)
}

/// Ray-casting point-in-polygon test.
///
/// Degenerate rings contain nothing. Points exactly on an edge may land on
/// either side; hover hit-testing does not need boundary exactness.
pub fn point_in_ring(point: DVec2, ring: &[DVec2]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
