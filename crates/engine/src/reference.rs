//! Registry of fixed reference infrastructure points.
//!
//! A small (under ~100 entries) set of named anchor points (substations,
//! distribution hubs) loaded once at startup and queried by the
//! classifier. Queries are a linear scan; at this size an index structure
//! would cost more than it saves.

use bevy::math::DVec2;
use bevy::prelude::*;

/// One fixed infrastructure anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceNode {
    pub name: String,
    pub position: DVec2,
    /// Relative strength in [0, 1]; kept for paint expressions, not used
    /// by the distance math.
    pub strength: f32,
}

impl ReferenceNode {
    pub fn new(name: impl Into<String>, position: DVec2, strength: f32) -> Self {
        Self {
            name: name.into(),
            position,
            strength,
        }
    }
}

/// Insertion-ordered registry of reference nodes with radius queries.
#[derive(Resource, Debug, Default)]
pub struct ProximityIndex {
    nodes: Vec<ReferenceNode>,
}

impl ProximityIndex {
    pub fn new(nodes: Vec<ReferenceNode>) -> Self {
        Self { nodes }
    }

    pub fn push(&mut self, node: ReferenceNode) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[ReferenceNode] {
        &self.nodes
    }

    /// First node within `max_distance` of `point`, in insertion order.
    ///
    /// Deliberately NOT the globally nearest node: downstream intensity
    /// values depend on which node is "the" match, and the shipped
    /// behavior short-circuits on the first hit. Callers that genuinely
    /// want the closest node use [`exhaustive_nearest`].
    ///
    /// [`exhaustive_nearest`]: ProximityIndex::exhaustive_nearest
    pub fn nearest(&self, point: DVec2, max_distance: f64) -> Option<(&ReferenceNode, f64)> {
        for node in &self.nodes {
            let distance = node.position.distance(point);
            if distance < max_distance {
                return Some((node, distance));
            }
        }
        None
    }

    /// Globally nearest node regardless of distance. Offered as the
    /// alternative to [`nearest`]; not the default lookup.
    ///
    /// [`nearest`]: ProximityIndex::nearest
    pub fn exhaustive_nearest(&self, point: DVec2) -> Option<(&ReferenceNode, f64)> {
        self.nodes
            .iter()
            .map(|node| (node, node.position.distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}
