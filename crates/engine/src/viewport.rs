//! Viewport state and host interaction events.
//!
//! The host application forwards camera and pointer activity as events;
//! [`apply_viewport_events`] folds them into a single [`ViewportState`]
//! resource that downstream systems read instead of tracking events
//! themselves.

use bevy::math::DVec2;
use bevy::prelude::*;

use crate::config::MIN_ACTIVE_ZOOM;

/// Camera finished moving; carries the resulting zoom level.
#[derive(Event, Debug, Clone, Copy)]
pub struct CameraMoved {
    pub zoom: f64,
}

/// The hosting view was shown or hidden (tab switch, route change).
#[derive(Event, Debug, Clone, Copy)]
pub struct VisibilityChanged {
    pub visible: bool,
}

/// Pointer moved over the map, in lon/lat coordinates.
#[derive(Event, Debug, Clone, Copy)]
pub struct PointerMoved {
    pub position: DVec2,
}

/// Pointer clicked on the map, in lon/lat coordinates.
#[derive(Event, Debug, Clone, Copy)]
pub struct PointerClicked {
    pub position: DVec2,
}

/// Pointer left the map entirely.
#[derive(Event, Debug, Clone, Copy)]
pub struct PointerLeft;

/// Folded-down view of the host viewport.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub zoom: f64,
    pub visible: bool,
    /// Last known pointer position; `None` once the pointer leaves.
    pub pointer: Option<DVec2>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: 0.0,
            visible: true,
            pointer: None,
        }
    }
}

impl ViewportState {
    /// Whether the animation pipeline should run at all: the view must be
    /// visible and zoomed in past the activation threshold.
    pub fn is_active(&self) -> bool {
        self.visible && self.zoom >= MIN_ACTIVE_ZOOM
    }
}

/// System: fold host events into [`ViewportState`].
pub fn apply_viewport_events(
    mut state: ResMut<ViewportState>,
    mut camera: EventReader<CameraMoved>,
    mut visibility: EventReader<VisibilityChanged>,
    mut moved: EventReader<PointerMoved>,
    mut left: EventReader<PointerLeft>,
) {
    for ev in camera.read() {
        state.zoom = ev.zoom;
    }
    for ev in visibility.read() {
        state.visible = ev.visible;
    }
    for ev in moved.read() {
        state.pointer = Some(ev.position);
    }
    if left.read().next().is_some() {
        state.pointer = None;
    }
}
