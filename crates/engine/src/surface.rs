//! Abstract interface to the host map rendering surface.
//!
//! The real surface is a GL map widget owned by the host application; this
//! subsystem only ever talks to it through [`MapSurface`]. The trait covers
//! the five operations the pipeline needs: feature queries, derived-state
//! writes (consumed by paint expressions), wholesale particle publication,
//! and transient popups.
//!
//! [`MemorySurface`] is a full in-process implementation used by the demo
//! binary and by tests.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use bevy::color::Color;
use bevy::math::DVec2;
use bevy::prelude::*;
use thiserror::Error;

use crate::config::READY_TIMEOUT_SECS;
use crate::feature::{FeatureId, MapFeature};

/// A value written into a feature's derived (paint) state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
}

/// One derived-state entry: key plus value.
pub type StateEntry = (&'static str, StateValue);

/// A single published flow particle. Ephemeral: the whole collection is
/// replaced every processed tick and particles carry no identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPoint {
    pub position: DVec2,
    pub size: f32,
    pub opacity: f32,
    pub color: Color,
}

/// The particle field handed to the surface each processed tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCollection {
    pub points: Vec<FlowPoint>,
}

impl PointCollection {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Handle to a popup created on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupId(pub u64);

/// Failures surfaced by [`MapSurface`] writes. All of these are recovered
/// locally by callers; none are fatal to the pipeline.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("unknown source layer '{0}'")]
    UnknownLayer(String),
    #[error("feature {1} is not present in layer '{0}'")]
    UnknownFeature(String, FeatureId),
    #[error("unknown data source '{0}'")]
    UnknownSource(String),
}

/// The host rendering surface, as seen by this subsystem.
pub trait MapSurface: Send + Sync {
    /// All features currently rendered on the given layers.
    fn query_visible_features(&self, layers: &[&str]) -> Vec<MapFeature>;

    /// Features on the given layers containing `point`.
    fn query_features_near(&self, point: DVec2, layers: &[&str]) -> Vec<MapFeature>;

    /// Merge `entries` into the derived state of one feature.
    fn set_derived_state(
        &mut self,
        layer: &str,
        id: FeatureId,
        entries: &[StateEntry],
    ) -> Result<(), SurfaceError>;

    /// Replace the contents of a point source wholesale.
    fn replace_source_data(
        &mut self,
        source: &str,
        points: PointCollection,
    ) -> Result<(), SurfaceError>;

    /// Create a popup anchored at `anchor`. The caller owns the handle and
    /// must remove a previous popup on the same interaction channel before
    /// creating a new one.
    fn show_popup(&mut self, anchor: DVec2, body: String) -> PopupId;

    /// Remove a popup. Removing an already-removed popup is a no-op.
    fn remove_popup(&mut self, id: PopupId);

    /// Whether style and data are loaded enough to query.
    fn is_ready(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Resource wrapping the host surface. Inserted by the host application;
/// systems take `Option<ResMut<SurfaceHandle>>` and no-op when absent.
#[derive(Resource)]
pub struct SurfaceHandle(pub Box<dyn MapSurface>);

impl SurfaceHandle {
    pub fn new(surface: impl MapSurface + 'static) -> Self {
        Self(Box::new(surface))
    }
}

/// Tracks which stale feature references have already been logged, so a
/// feature that left the viewport warns once rather than every tick.
#[derive(Resource, Debug, Default)]
pub struct StaleFeatureLog {
    seen: HashSet<(String, FeatureId)>,
}

impl StaleFeatureLog {
    /// Record the occurrence; returns true the first time it is seen.
    pub fn note(&mut self, layer: &str, id: FeatureId) -> bool {
        self.seen.insert((layer.to_string(), id))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// One-shot readiness wait on the surface.
///
/// The host signals readiness through [`MapSurface::is_ready`]; if it never
/// does, the pipeline proceeds after a bounded timeout instead of waiting
/// forever on a signal that may never fire.
#[derive(Resource, Debug, Default)]
pub struct SurfaceReadiness {
    ready: bool,
    waited_secs: f32,
}

impl SurfaceReadiness {
    pub fn is_ready(&self) -> bool {
        self.ready
    }
}

/// System: flip [`SurfaceReadiness`] once the surface reports ready, or
/// after the fallback timeout elapses.
pub fn poll_surface_readiness(
    time: Res<Time>,
    mut readiness: ResMut<SurfaceReadiness>,
    surface: Option<Res<SurfaceHandle>>,
) {
    if readiness.ready {
        return;
    }
    let Some(surface) = surface else {
        return;
    };
    if surface.0.is_ready() {
        debug!("surface reported ready after {:.2}s", readiness.waited_secs);
        readiness.ready = true;
        return;
    }
    readiness.waited_secs += time.delta_secs();
    if readiness.waited_secs >= READY_TIMEOUT_SECS {
        warn!(
            "surface never signalled ready within {READY_TIMEOUT_SECS}s; proceeding anyway"
        );
        readiness.ready = true;
    }
}

// ---------------------------------------------------------------------------
// In-memory surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Popup {
    anchor: DVec2,
    body: String,
}

/// In-process [`MapSurface`] backed by per-layer feature vectors.
#[derive(Default)]
pub struct MemorySurface {
    layers: HashMap<String, Vec<MapFeature>>,
    derived: HashMap<(String, FeatureId), HashMap<&'static str, StateValue>>,
    sources: HashMap<String, PointCollection>,
    popups: HashMap<u64, Popup>,
    next_popup: u64,
    publish_count: u64,
    ready: bool,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the feature set rendered on a layer.
    pub fn insert_layer(&mut self, name: impl Into<String>, features: Vec<MapFeature>) {
        self.layers.insert(name.into(), features);
    }

    /// Register an initially empty point source.
    pub fn register_source(&mut self, name: impl Into<String>) {
        self.sources.insert(name.into(), PointCollection::default());
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Number of `replace_source_data` calls accepted so far.
    pub fn publish_count(&self) -> u64 {
        self.publish_count
    }

    /// Current contents of a registered point source.
    pub fn source_points(&self, source: &str) -> Option<&PointCollection> {
        self.sources.get(source)
    }

    /// Derived-state value for one feature, if any has been written.
    pub fn derived_state(&self, layer: &str, id: FeatureId, key: &str) -> Option<StateValue> {
        self.derived
            .get(&(layer.to_string(), id))
            .and_then(|m| m.get(key))
            .copied()
    }

    /// Feature ids on `layer` whose derived `key` is currently `true`.
    pub fn flagged_features(&self, layer: &str, key: &str) -> Vec<FeatureId> {
        let mut ids: Vec<FeatureId> = self
            .derived
            .iter()
            .filter(|((l, _), state)| {
                l == layer && matches!(state.get(key), Some(StateValue::Bool(true)))
            })
            .map(|((_, id), _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn active_popup_count(&self) -> usize {
        self.popups.len()
    }

    /// Body text of the single active popup, for assertions.
    pub fn popup_bodies(&self) -> Vec<&str> {
        self.popups.values().map(|p| p.body.as_str()).collect()
    }

    pub fn popup_anchor(&self, id: PopupId) -> Option<DVec2> {
        self.popups.get(&id.0).map(|p| p.anchor)
    }
}

impl MapSurface for MemorySurface {
    fn query_visible_features(&self, layers: &[&str]) -> Vec<MapFeature> {
        let mut out = Vec::new();
        for layer in layers {
            if let Some(features) = self.layers.get(*layer) {
                out.extend(features.iter().cloned());
            }
        }
        out
    }

    fn query_features_near(&self, point: DVec2, layers: &[&str]) -> Vec<MapFeature> {
        let mut out = Vec::new();
        for layer in layers {
            if let Some(features) = self.layers.get(*layer) {
                out.extend(features.iter().filter(|f| f.contains(point)).cloned());
            }
        }
        out
    }

    fn set_derived_state(
        &mut self,
        layer: &str,
        id: FeatureId,
        entries: &[StateEntry],
    ) -> Result<(), SurfaceError> {
        let features = self
            .layers
            .get(layer)
            .ok_or_else(|| SurfaceError::UnknownLayer(layer.to_string()))?;
        if !features.iter().any(|f| f.id == id) {
            return Err(SurfaceError::UnknownFeature(layer.to_string(), id));
        }
        let state = self.derived.entry((layer.to_string(), id)).or_default();
        for &(key, value) in entries {
            state.insert(key, value);
        }
        Ok(())
    }

    fn replace_source_data(
        &mut self,
        source: &str,
        points: PointCollection,
    ) -> Result<(), SurfaceError> {
        let slot = self
            .sources
            .get_mut(source)
            .ok_or_else(|| SurfaceError::UnknownSource(source.to_string()))?;
        *slot = points;
        self.publish_count += 1;
        Ok(())
    }

    fn show_popup(&mut self, anchor: DVec2, body: String) -> PopupId {
        self.next_popup += 1;
        self.popups.insert(self.next_popup, Popup { anchor, body });
        PopupId(self.next_popup)
    }

    fn remove_popup(&mut self, id: PopupId) {
        self.popups.remove(&id.0);
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
