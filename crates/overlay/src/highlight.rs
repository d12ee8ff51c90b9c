//! Boundary hover highlighting and popups.
//!
//! Two boundary layers (district and block) share one highlight mechanism:
//! at most one feature per layer carries the `highlighted` derived flag,
//! and every change is clear-then-set so a fast-moving pointer can never
//! leave two features lit. Popups run on two independent channels, hover
//! and click, each holding at most one live popup.

use bevy::math::DVec2;
use bevy::prelude::*;

use engine::config::{BUILDING_LAYER, PRIMARY_BOUNDARY_SOURCE, SECONDARY_BOUNDARY_SOURCE};
use engine::feature::{FeatureId, MapFeature};
use engine::surface::{
    MapSurface, PopupId, StaleFeatureLog, StateValue, SurfaceHandle, SurfaceReadiness,
};
use engine::viewport::{CameraMoved, PointerClicked, PointerLeft, PointerMoved};

/// Derived-state key driving the highlight paint expression.
const HIGHLIGHT_KEY: &str = "highlighted";

/// The two administrative boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryLayer {
    /// District-level boundaries.
    Primary,
    /// Block-level boundaries.
    Secondary,
}

impl BoundaryLayer {
    pub fn source(self) -> &'static str {
        match self {
            BoundaryLayer::Primary => PRIMARY_BOUNDARY_SOURCE,
            BoundaryLayer::Secondary => SECONDARY_BOUNDARY_SOURCE,
        }
    }
}

/// External request to highlight a named boundary (e.g. from a sidebar
/// list). `name: None` clears the layer's highlight.
#[derive(Event, Debug, Clone)]
pub struct HighlightRequest {
    pub layer: BoundaryLayer,
    pub name: Option<String>,
}

/// Which feature, if any, is highlighted on each boundary layer.
#[derive(Resource, Debug, Default)]
pub struct HighlightState {
    primary: Option<FeatureId>,
    secondary: Option<FeatureId>,
}

impl HighlightState {
    pub fn active(&self, layer: BoundaryLayer) -> Option<FeatureId> {
        *self.slot(layer)
    }

    fn slot(&self, layer: BoundaryLayer) -> &Option<FeatureId> {
        match layer {
            BoundaryLayer::Primary => &self.primary,
            BoundaryLayer::Secondary => &self.secondary,
        }
    }

    fn slot_mut(&mut self, layer: BoundaryLayer) -> &mut Option<FeatureId> {
        match layer {
            BoundaryLayer::Primary => &mut self.primary,
            BoundaryLayer::Secondary => &mut self.secondary,
        }
    }
}

/// Live popups per interaction channel.
#[derive(Resource, Debug, Default)]
pub struct PopupState {
    hover: Option<PopupId>,
    click: Option<PopupId>,
}

impl PopupState {
    pub fn hover(&self) -> Option<PopupId> {
        self.hover
    }

    pub fn click(&self) -> Option<PopupId> {
        self.click
    }
}

fn write_highlight(
    surface: &mut dyn MapSurface,
    stale: &mut StaleFeatureLog,
    layer: BoundaryLayer,
    id: FeatureId,
    on: bool,
) {
    if let Err(err) = surface.set_derived_state(
        layer.source(),
        id,
        &[(HIGHLIGHT_KEY, StateValue::Bool(on))],
    ) {
        if stale.note(layer.source(), id) {
            warn!("dropping highlight write for departed boundary: {err}");
        }
    }
}

/// Highlight one boundary feature, clearing the layer's previous highlight
/// first. Re-highlighting the already-active feature is a no-op.
pub fn set_highlight(
    state: &mut HighlightState,
    surface: &mut dyn MapSurface,
    stale: &mut StaleFeatureLog,
    layer: BoundaryLayer,
    id: FeatureId,
) {
    let slot = state.slot_mut(layer);
    if *slot == Some(id) {
        return;
    }
    if let Some(previous) = slot.take() {
        write_highlight(surface, stale, layer, previous, false);
    }
    write_highlight(surface, stale, layer, id, true);
    *state.slot_mut(layer) = Some(id);
}

/// Clear a layer's highlight. Idempotent.
pub fn clear_highlight(
    state: &mut HighlightState,
    surface: &mut dyn MapSurface,
    stale: &mut StaleFeatureLog,
    layer: BoundaryLayer,
) {
    if let Some(previous) = state.slot_mut(layer).take() {
        write_highlight(surface, stale, layer, previous, false);
    }
}

fn clear_hover_popup(popups: &mut PopupState, surface: &mut dyn MapSurface) {
    if let Some(id) = popups.hover.take() {
        surface.remove_popup(id);
    }
}

fn boundary_at(
    surface: &dyn MapSurface,
    layer: BoundaryLayer,
    position: DVec2,
) -> Option<MapFeature> {
    surface
        .query_features_near(position, &[layer.source()])
        .into_iter()
        .next()
}

/// System: hover highlighting and the hover popup.
///
/// The first containing boundary wins, districts before blocks. Leaving
/// all boundaries clears both highlights and the hover popup.
pub fn handle_pointer_hover(
    mut moved: EventReader<PointerMoved>,
    readiness: Res<SurfaceReadiness>,
    surface: Option<ResMut<SurfaceHandle>>,
    mut state: ResMut<HighlightState>,
    mut popups: ResMut<PopupState>,
    mut stale: ResMut<StaleFeatureLog>,
) {
    let Some(position) = moved.read().last().map(|ev| ev.position) else {
        return;
    };
    if !readiness.is_ready() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    let surface = surface.0.as_mut();

    let hit = [BoundaryLayer::Primary, BoundaryLayer::Secondary]
        .into_iter()
        .find_map(|layer| boundary_at(surface, layer, position).map(|f| (layer, f)));

    let Some((layer, feature)) = hit else {
        clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Primary);
        clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Secondary);
        clear_hover_popup(&mut popups, surface);
        return;
    };

    let other = match layer {
        BoundaryLayer::Primary => BoundaryLayer::Secondary,
        BoundaryLayer::Secondary => BoundaryLayer::Primary,
    };
    clear_highlight(&mut state, surface, &mut stale, other);

    let rehover = state.active(layer) == Some(feature.id);
    set_highlight(&mut state, surface, &mut stale, layer, feature.id);

    // Refresh the popup only when the hovered feature changes.
    if !rehover {
        clear_hover_popup(&mut popups, surface);
        let body = feature
            .name
            .clone()
            .unwrap_or_else(|| format!("Boundary {}", feature.id));
        popups.hover = Some(surface.show_popup(position, body));
    }
}

/// System: click popups over buildings.
///
/// A click replaces any previous click popup; clicking empty ground just
/// dismisses it.
pub fn handle_pointer_clicks(
    mut clicks: EventReader<PointerClicked>,
    readiness: Res<SurfaceReadiness>,
    surface: Option<ResMut<SurfaceHandle>>,
    mut popups: ResMut<PopupState>,
) {
    let Some(position) = clicks.read().last().map(|ev| ev.position) else {
        return;
    };
    if !readiness.is_ready() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    let surface = surface.0.as_mut();

    if let Some(id) = popups.click.take() {
        surface.remove_popup(id);
    }
    let Some(building) = surface
        .query_features_near(position, &[BUILDING_LAYER])
        .into_iter()
        .next()
    else {
        return;
    };
    let label = building
        .name
        .clone()
        .unwrap_or_else(|| format!("Building {}", building.id));
    let body = format!("{} ({}m)", label, building.height.round());
    popups.click = Some(surface.show_popup(position, body));
}

/// System: pointer leaving the map clears hover state entirely. The click
/// popup stays; it is dismissed by the next click.
pub fn handle_pointer_left(
    mut left: EventReader<PointerLeft>,
    surface: Option<ResMut<SurfaceHandle>>,
    mut state: ResMut<HighlightState>,
    mut popups: ResMut<PopupState>,
    mut stale: ResMut<StaleFeatureLog>,
) {
    if left.read().next().is_none() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    let surface = surface.0.as_mut();
    clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Primary);
    clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Secondary);
    clear_hover_popup(&mut popups, surface);
}

/// System: a camera move invalidates the hover hit-test, so drop the hover
/// highlight and popup rather than leave them anchored to the wrong place.
pub fn handle_camera_moved(
    mut camera: EventReader<CameraMoved>,
    surface: Option<ResMut<SurfaceHandle>>,
    mut state: ResMut<HighlightState>,
    mut popups: ResMut<PopupState>,
    mut stale: ResMut<StaleFeatureLog>,
) {
    if camera.read().next().is_none() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    let surface = surface.0.as_mut();
    clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Primary);
    clear_highlight(&mut state, surface, &mut stale, BoundaryLayer::Secondary);
    clear_hover_popup(&mut popups, surface);
}

/// System: serve external highlight-by-name requests.
pub fn handle_highlight_requests(
    mut requests: EventReader<HighlightRequest>,
    readiness: Res<SurfaceReadiness>,
    surface: Option<ResMut<SurfaceHandle>>,
    mut state: ResMut<HighlightState>,
    mut stale: ResMut<StaleFeatureLog>,
) {
    if !readiness.is_ready() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };
    let surface = surface.0.as_mut();
    for request in requests.read() {
        let Some(name) = &request.name else {
            clear_highlight(&mut state, surface, &mut stale, request.layer);
            continue;
        };
        let matched = surface
            .query_visible_features(&[request.layer.source()])
            .into_iter()
            .find(|f| f.name.as_deref() == Some(name.as_str()));
        match matched {
            Some(feature) => {
                set_highlight(&mut state, surface, &mut stale, request.layer, feature.id);
            }
            None => warn!("highlight request for unknown boundary '{name}'"),
        }
    }
}
