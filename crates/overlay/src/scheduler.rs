//! Animation scheduling: lifecycle state plus a two-level throttle.
//!
//! The field is rebuilt from scratch every processed tick, so the throttle
//! is the only thing standing between a dense viewport and a melted frame
//! budget. Two levels: a frame-skip (process every Nth frame) and a
//! wall-clock minimum interval. Each tick is independent; an overrun delays
//! the next tick instead of compounding.

use std::time::Duration;

use bevy::prelude::*;

use engine::classify::{classify_batch, ClassificationCache};
use engine::config::{BUILDING_LAYER, FRAME_SKIP, PARTICLE_SOURCE, ROAD_LAYER, THROTTLE_MS};
use engine::engine_rng::EngineRng;
use engine::reference::ProximityIndex;
use engine::surface::{PointCollection, SurfaceHandle, SurfaceReadiness};
use engine::viewport::ViewportState;

use crate::particles::{generate_field, FlowTarget};

/// Lifecycle phase of the animation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerPhase {
    #[default]
    Idle,
    Running,
}

/// Animation lifecycle and throttle state.
#[derive(Resource, Debug)]
pub struct AnimationScheduler {
    phase: SchedulerPhase,
    frame_counter: u64,
    last_run: Option<Duration>,
    pub frame_skip: u64,
    pub min_interval: Duration,
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            frame_counter: 0,
            last_run: None,
            frame_skip: FRAME_SKIP,
            min_interval: Duration::from_millis(THROTTLE_MS),
        }
    }
}

impl AnimationScheduler {
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == SchedulerPhase::Running
    }

    pub fn start(&mut self) {
        self.phase = SchedulerPhase::Running;
    }

    /// Stop the loop. Throttle state is kept; a restart resumes the same
    /// cadence rather than bursting.
    pub fn stop(&mut self) {
        self.phase = SchedulerPhase::Idle;
    }

    /// Advance one frame and decide whether this frame is processed.
    ///
    /// Returns false while idle, on skipped frames, and when the wall-clock
    /// interval since the last processed frame is still too short.
    pub fn should_process(&mut self, now: Duration) -> bool {
        if self.phase != SchedulerPhase::Running {
            return false;
        }
        self.frame_counter = self.frame_counter.wrapping_add(1);
        if self.frame_counter % self.frame_skip != 0 {
            return false;
        }
        if let Some(last) = self.last_run {
            if now.saturating_sub(last) < self.min_interval {
                return false;
            }
        }
        self.last_run = Some(now);
        true
    }
}

/// System: run the animation lifecycle and rebuild the particle field on
/// processed ticks.
///
/// Starts when the viewport becomes active (visible and zoomed in past the
/// threshold), stops and clears the published field when it goes inactive.
/// Publish failures are logged and dropped; the next tick rebuilds from
/// scratch anyway.
pub fn drive_particle_field(
    time: Res<Time>,
    viewport: Res<ViewportState>,
    readiness: Res<SurfaceReadiness>,
    mut scheduler: ResMut<AnimationScheduler>,
    surface: Option<ResMut<SurfaceHandle>>,
    index: Res<ProximityIndex>,
    mut cache: ResMut<ClassificationCache>,
    mut rng: ResMut<EngineRng>,
) {
    if !readiness.is_ready() {
        return;
    }
    let Some(mut surface) = surface else {
        return;
    };

    let active = viewport.is_active();
    if active && !scheduler.is_running() {
        info!("flow animation started (zoom {:.1})", viewport.zoom);
        scheduler.start();
    } else if !active && scheduler.is_running() {
        info!("flow animation stopped");
        scheduler.stop();
        // Leave no frozen particles behind.
        if let Err(err) = surface
            .0
            .replace_source_data(PARTICLE_SOURCE, PointCollection::default())
        {
            warn!("failed to clear particle field: {err}");
        }
        return;
    }

    if !scheduler.should_process(time.elapsed()) {
        return;
    }

    let buildings = surface.0.query_visible_features(&[BUILDING_LAYER]);
    let classified = classify_batch(&buildings, &index, &mut cache, &mut rng.0);
    let targets: Vec<FlowTarget> = buildings
        .iter()
        .zip(&classified)
        .filter(|(_, (_, c))| c.is_primary)
        .filter_map(|(feature, _)| FlowTarget::from_feature(feature))
        .collect();

    let roads = surface.0.query_visible_features(&[ROAD_LAYER]);
    let field = generate_field(
        time.elapsed_secs_f64(),
        viewport.zoom,
        &targets,
        &roads,
        &mut rng.0,
    );
    debug!(
        "published {} particles from {} targets over {} roads",
        field.len(),
        targets.len(),
        roads.len()
    );
    if let Err(err) = surface.0.replace_source_data(PARTICLE_SOURCE, field) {
        warn!("failed to publish particle field: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::DVec2;
    use engine::feature::MapFeature;
    use engine::surface::{MemorySurface, StaleFeatureLog};
    use engine::viewport::{CameraMoved, PointerLeft, PointerMoved, VisibilityChanged};

    #[test]
    fn test_should_process_respects_frame_skip() {
        let mut scheduler = AnimationScheduler {
            frame_skip: 2,
            min_interval: Duration::ZERO,
            ..AnimationScheduler::default()
        };
        scheduler.start();
        let decisions: Vec<bool> = (0..6)
            .map(|i| scheduler.should_process(Duration::from_millis(i)))
            .collect();
        assert_eq!(decisions, vec![false, true, false, true, false, true]);
    }

    #[test]
    fn test_should_process_respects_min_interval() {
        let mut scheduler = AnimationScheduler {
            frame_skip: 1,
            min_interval: Duration::from_millis(50),
            ..AnimationScheduler::default()
        };
        scheduler.start();
        assert!(scheduler.should_process(Duration::from_millis(0)));
        assert!(!scheduler.should_process(Duration::from_millis(20)));
        assert!(!scheduler.should_process(Duration::from_millis(49)));
        assert!(scheduler.should_process(Duration::from_millis(50)));
    }

    #[test]
    fn test_idle_scheduler_never_processes() {
        let mut scheduler = AnimationScheduler::default();
        for i in 0..10 {
            assert!(!scheduler.should_process(Duration::from_millis(i * 100)));
        }
    }

    fn flow_surface() -> MemorySurface {
        let mut surface = MemorySurface::new();
        // One primary building (height divisible by 4) next to a road.
        surface.insert_layer(
            BUILDING_LAYER,
            vec![MapFeature::polygon(
                1,
                vec![
                    DVec2::new(0.0, 0.0),
                    DVec2::new(0.0002, 0.0),
                    DVec2::new(0.0002, 0.0002),
                    DVec2::new(0.0, 0.0002),
                ],
            )
            .with_height(16.0)],
        );
        surface.insert_layer(
            ROAD_LAYER,
            vec![MapFeature::line(
                2,
                vec![DVec2::new(-0.002, 0.0005), DVec2::new(0.002, 0.0005)],
            )],
        );
        surface.register_source(PARTICLE_SOURCE);
        surface.set_ready(true);
        surface
    }

    fn test_app() -> App {
        let mut app = App::new();
        app.init_resource::<Time>();
        app.init_resource::<ViewportState>();
        app.init_resource::<ClassificationCache>();
        app.init_resource::<ProximityIndex>();
        app.init_resource::<EngineRng>();
        app.init_resource::<StaleFeatureLog>();
        app.init_resource::<SurfaceReadiness>();
        app.add_event::<CameraMoved>();
        app.add_event::<VisibilityChanged>();
        app.add_event::<PointerMoved>();
        app.add_event::<PointerLeft>();
        // Process every frame so tests don't fight the throttle.
        app.insert_resource(AnimationScheduler {
            frame_skip: 1,
            min_interval: Duration::ZERO,
            ..AnimationScheduler::default()
        });
        app.insert_resource(SurfaceHandle::new(flow_surface()));
        app.add_systems(
            Update,
            (
                engine::surface::poll_surface_readiness,
                engine::viewport::apply_viewport_events,
                drive_particle_field,
            )
                .chain(),
        );
        app
    }

    fn memory(app: &App) -> &MemorySurface {
        app.world()
            .resource::<SurfaceHandle>()
            .0
            .as_any()
            .downcast_ref()
            .unwrap()
    }

    fn advance(app: &mut App, millis: u64) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_millis(millis));
        app.update();
    }

    #[test]
    fn test_inactive_viewport_publishes_nothing() {
        let mut app = test_app();
        // Default zoom 0.0 is below the activation threshold.
        advance(&mut app, 16);
        advance(&mut app, 16);
        assert_eq!(memory(&app).publish_count(), 0);
        assert!(!app.world().resource::<AnimationScheduler>().is_running());
    }

    #[test]
    fn test_active_viewport_publishes_particles() {
        let mut app = test_app();
        app.world_mut().send_event(CameraMoved { zoom: 15.0 });
        advance(&mut app, 16);
        advance(&mut app, 16);
        let mem = memory(&app);
        assert!(mem.publish_count() >= 1);
        assert!(!mem.source_points(PARTICLE_SOURCE).unwrap().is_empty());
        assert!(app.world().resource::<AnimationScheduler>().is_running());
    }

    #[test]
    fn test_hiding_view_stops_and_clears_field() {
        let mut app = test_app();
        app.world_mut().send_event(CameraMoved { zoom: 15.0 });
        advance(&mut app, 16);
        advance(&mut app, 16);
        assert!(!memory(&app).source_points(PARTICLE_SOURCE).unwrap().is_empty());

        app.world_mut().send_event(VisibilityChanged { visible: false });
        advance(&mut app, 16);
        let mem = memory(&app);
        assert!(mem.source_points(PARTICLE_SOURCE).unwrap().is_empty());
        assert!(!app.world().resource::<AnimationScheduler>().is_running());

        // Stopped means stopped: no further publishes.
        let published = mem.publish_count();
        advance(&mut app, 16);
        assert_eq!(memory(&app).publish_count(), published);
    }

    #[test]
    fn test_zooming_out_stops_the_loop() {
        let mut app = test_app();
        app.world_mut().send_event(CameraMoved { zoom: 15.0 });
        advance(&mut app, 16);
        assert!(app.world().resource::<AnimationScheduler>().is_running());

        app.world_mut().send_event(CameraMoved { zoom: 11.0 });
        advance(&mut app, 16);
        assert!(!app.world().resource::<AnimationScheduler>().is_running());
    }
}
