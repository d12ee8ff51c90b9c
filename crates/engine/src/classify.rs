//! Feature classification: primary / connected / negative flags plus a
//! connection intensity, written into the surface's derived state.
//!
//! Classification is computed once per feature and cached for the session;
//! repeated viewport passes re-apply the cached flags so buildings never
//! flicker between states as the camera moves.

use std::collections::HashMap;

use bevy::math::DVec2;
use bevy::prelude::*;
use rand::Rng;

use crate::config::{
    BUILDING_LAYER, CONNECT_RADIUS, GATE_BASE, GATE_LARGE, GATE_LARGE_AREA, GATE_LARGE_HEIGHT,
    INTENSITY_FALLOFF, NEGATIVE_PROBABILITY, PRIMARY_HEIGHT_MODULUS, PRIMARY_MIN_HEIGHT,
};
use crate::engine_rng::EngineRng;
use crate::feature::{FeatureId, MapFeature};
use crate::reference::ProximityIndex;
use crate::surface::{StaleFeatureLog, StateEntry, StateValue, SurfaceHandle, SurfaceReadiness};
use crate::viewport::CameraMoved;

/// Session-stable classification of one feature.
///
/// At most one of the three flags is set; `connection_intensity` is only
/// meaningful when `is_connected` is true.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Classification {
    pub is_primary: bool,
    pub is_connected: bool,
    pub connection_intensity: f32,
    pub is_negative: bool,
}

impl Classification {
    /// Derived-state entries consumed by the surface's paint expressions.
    pub fn state_entries(&self) -> [StateEntry; 4] {
        [
            ("isPrimary", StateValue::Bool(self.is_primary)),
            ("isConnected", StateValue::Bool(self.is_connected)),
            (
                "connectionIntensity",
                StateValue::Number(f64::from(self.connection_intensity)),
            ),
            ("isNegative", StateValue::Bool(self.is_negative)),
        ]
    }
}

/// Whether a height satisfies the deterministic primary predicate.
pub fn is_primary_height(height: f64) -> bool {
    height > PRIMARY_MIN_HEIGHT && height % PRIMARY_HEIGHT_MODULUS == 0.0
}

/// Classify a single feature.
///
/// Primary status is purely height-based and deterministic. Everything else
/// draws from `rng`: a probability gate bounds how many features pay for
/// the proximity scan, and gated features become connected when a reference
/// node sits within [`CONNECT_RADIUS`] of their anchor. Intensity falls off
/// linearly with distance to the nearest primary anchor, so connected
/// buildings glow brighter near the cluster they feed from.
pub fn classify_feature(
    feature: &MapFeature,
    primary_anchors: &[DVec2],
    index: &ProximityIndex,
    rng: &mut impl Rng,
) -> Classification {
    if is_primary_height(feature.height) {
        return Classification {
            is_primary: true,
            ..Classification::default()
        };
    }

    let Some(anchor) = feature.anchor() else {
        return Classification::default();
    };

    let gate = rng.gen::<f64>() > GATE_BASE
        || (feature.height > GATE_LARGE_HEIGHT
            && feature.area() > GATE_LARGE_AREA
            && rng.gen::<f64>() > GATE_LARGE);

    if gate && index.nearest(anchor, CONNECT_RADIUS).is_some() {
        let min_primary_distance = primary_anchors
            .iter()
            .map(|p| p.distance(anchor))
            .fold(f64::INFINITY, f64::min);
        let intensity = (1.0 - min_primary_distance * INTENSITY_FALLOFF).clamp(0.0, 1.0);
        return Classification {
            is_connected: true,
            connection_intensity: intensity as f32,
            ..Classification::default()
        };
    }

    if rng.gen::<f64>() < NEGATIVE_PROBABILITY {
        return Classification {
            is_negative: true,
            ..Classification::default()
        };
    }

    Classification::default()
}

/// Anchors of all features satisfying the primary predicate. Computed over
/// the full visible set before per-feature classification so intensity sees
/// every primary, cached or not.
pub fn collect_primary_anchors(features: &[MapFeature]) -> Vec<DVec2> {
    features
        .iter()
        .filter(|f| is_primary_height(f.height))
        .filter_map(|f| f.anchor())
        .collect()
}

/// Session cache of classifications, keyed by feature id.
///
/// Entries are written exactly once and never overwritten; a feature that
/// scrolls out of view and back keeps its original classification.
#[derive(Resource, Debug, Default)]
pub struct ClassificationCache {
    entries: HashMap<FeatureId, Classification>,
}

impl ClassificationCache {
    pub fn get(&self, id: FeatureId) -> Option<Classification> {
        self.entries.get(&id).copied()
    }

    /// Return the cached classification, computing and storing it on first
    /// sight. The closure runs at most once per id for the cache lifetime.
    pub fn get_or_compute(
        &mut self,
        id: FeatureId,
        compute: impl FnOnce() -> Classification,
    ) -> Classification {
        *self.entries.entry(id).or_insert_with(compute)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Classify every visible feature, caching new ones.
pub fn classify_batch(
    features: &[MapFeature],
    index: &ProximityIndex,
    cache: &mut ClassificationCache,
    rng: &mut impl Rng,
) -> Vec<(FeatureId, Classification)> {
    let anchors = collect_primary_anchors(features);
    features
        .iter()
        .map(|feature| {
            let classification = cache.get_or_compute(feature.id, || {
                classify_feature(feature, &anchors, index, rng)
            });
            (feature.id, classification)
        })
        .collect()
}

/// System: re-apply classifications to the surface's derived state.
///
/// Runs once when the surface first becomes ready and again after every
/// camera move, since moves change which features are visible. Writes to
/// features that departed between query and write are logged once and
/// dropped.
pub fn refresh_feature_states(
    mut camera: EventReader<CameraMoved>,
    readiness: Res<SurfaceReadiness>,
    surface: Option<ResMut<SurfaceHandle>>,
    index: Res<ProximityIndex>,
    mut cache: ResMut<ClassificationCache>,
    mut rng: ResMut<EngineRng>,
    mut stale: ResMut<StaleFeatureLog>,
    mut primed: Local<bool>,
) {
    let moved = camera.read().count() > 0;
    if !readiness.is_ready() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    if *primed && !moved {
        return;
    }
    *primed = true;

    let features = surface.0.query_visible_features(&[BUILDING_LAYER]);
    let classified = classify_batch(&features, &index, &mut cache, &mut rng.0);
    debug!(
        "refreshed {} feature states ({} cached)",
        classified.len(),
        cache.len()
    );
    for (id, classification) in classified {
        if let Err(err) = surface
            .0
            .set_derived_state(BUILDING_LAYER, id, &classification.state_entries())
        {
            if stale.note(BUILDING_LAYER, id) {
                warn!("dropping state write for departed feature: {err}");
            }
        }
    }
}
