//! Core engine: feature classification, reference-node proximity, boundary
//! loading, and the abstract map-surface seam.
//!
//! The engine is host-agnostic: everything it knows about the actual map
//! widget flows through [`surface::MapSurface`], and everything it knows
//! about user interaction arrives as the events in [`viewport`]. The
//! `overlay` crate builds the animated particle field and highlight
//! behavior on top of these pieces.

use bevy::prelude::*;

pub mod boundaries;
pub mod classify;
pub mod config;
pub mod engine_rng;
pub mod feature;
pub mod geometry;
pub mod reference;
pub mod surface;
pub mod viewport;

/// System set markers for ordering against the overlay's systems.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineSet {
    /// Readiness polling and viewport event folding.
    Ingest,
    /// Classification and derived-state writes.
    Classify,
}

pub struct EnginePlugin;

impl Plugin for EnginePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<viewport::ViewportState>()
            .init_resource::<classify::ClassificationCache>()
            .init_resource::<reference::ProximityIndex>()
            .init_resource::<engine_rng::EngineRng>()
            .init_resource::<surface::SurfaceReadiness>()
            .init_resource::<surface::StaleFeatureLog>()
            .add_event::<viewport::CameraMoved>()
            .add_event::<viewport::VisibilityChanged>()
            .add_event::<viewport::PointerMoved>()
            .add_event::<viewport::PointerClicked>()
            .add_event::<viewport::PointerLeft>()
            .configure_sets(Update, (EngineSet::Ingest, EngineSet::Classify).chain())
            .add_systems(
                Update,
                (
                    surface::poll_surface_readiness,
                    viewport::apply_viewport_events,
                )
                    .in_set(EngineSet::Ingest),
            )
            .add_systems(
                Update,
                classify::refresh_feature_states.in_set(EngineSet::Classify),
            );
    }
}
