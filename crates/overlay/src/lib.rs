//! Interactive overlay on top of the engine: the animated flow particle
//! field, boundary hover highlighting, and popups.

use bevy::prelude::*;

use engine::EngineSet;

pub mod highlight;
pub mod particles;
pub mod scheduler;

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<scheduler::AnimationScheduler>()
            .init_resource::<highlight::HighlightState>()
            .init_resource::<highlight::PopupState>()
            .add_event::<highlight::HighlightRequest>()
            .add_systems(
                Update,
                (
                    scheduler::drive_particle_field,
                    highlight::handle_pointer_hover,
                    highlight::handle_pointer_clicks,
                    highlight::handle_pointer_left,
                    highlight::handle_camera_moved,
                    highlight::handle_highlight_requests,
                )
                    .after(EngineSet::Classify),
            );
    }
}
