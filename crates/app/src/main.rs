//! Headless demo: runs the full pipeline against an in-memory surface.
//!
//! Builds a small synthetic city (a building grid, a few roads, two
//! boundary collections), then scripts a short interaction session:
//! zoom in, hover a district, click a building, leave, zoom out. Prints
//! what the surface saw and exits.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::math::DVec2;
use bevy::prelude::*;

use engine::boundaries::parse_boundaries;
use engine::config::{
    BUILDING_LAYER, PARTICLE_SOURCE, PRIMARY_BOUNDARY_SOURCE, ROAD_LAYER,
    SECONDARY_BOUNDARY_SOURCE,
};
use engine::feature::MapFeature;
use engine::reference::{ProximityIndex, ReferenceNode};
use engine::surface::{MemorySurface, SurfaceHandle};
use engine::viewport::{CameraMoved, PointerClicked, PointerLeft, PointerMoved};
use engine::EnginePlugin;
use overlay::OverlayPlugin;

/// Southwest corner of the synthetic city.
const ORIGIN: DVec2 = DVec2::new(-77.02, 38.90);

/// Building footprint side length, degrees.
const LOT: f64 = 0.0004;

/// Grid pitch between building corners, degrees.
const PITCH: f64 = 0.0008;

const GRID: u64 = 8;

const DISTRICTS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"name": "Old Town"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-77.0204, 38.8996], [-77.0168, 38.8996],
                [-77.0168, 38.9036], [-77.0204, 38.9036], [-77.0204, 38.8996]
            ]]}
        },
        {
            "type": "Feature",
            "properties": {"name": "Harborside"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-77.0168, 38.8996], [-77.0132, 38.8996],
                [-77.0132, 38.9036], [-77.0168, 38.9036], [-77.0168, 38.8996]
            ]]}
        }
    ]
}"#;

const BLOCKS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"GEOID": "11001004702"},
            "geometry": {"type": "Polygon", "coordinates": [[
                [-77.0204, 38.9036], [-77.0132, 38.9036],
                [-77.0132, 38.9060], [-77.0204, 38.9060], [-77.0204, 38.9036]
            ]]}
        }
    ]
}"#;

fn synthetic_city() -> MemorySurface {
    let mut surface = MemorySurface::new();

    // Building grid with a deterministic height spread; some heights land
    // on the primary predicate, most do not.
    let mut buildings = Vec::new();
    for row in 0..GRID {
        for col in 0..GRID {
            let sw = ORIGIN + DVec2::new(col as f64 * PITCH, row as f64 * PITCH);
            let id = row * GRID + col + 1;
            let height = 6.0 + ((id * 7) % 40) as f64;
            buildings.push(
                MapFeature::polygon(
                    id,
                    vec![
                        sw,
                        sw + DVec2::new(LOT, 0.0),
                        sw + DVec2::new(LOT, LOT),
                        sw + DVec2::new(0.0, LOT),
                    ],
                )
                .with_height(height),
            );
        }
    }
    surface.insert_layer(BUILDING_LAYER, buildings);

    // One east-west road per grid row, running between the lots.
    let roads = (0..GRID)
        .map(|row| {
            let y = ORIGIN.y + row as f64 * PITCH + LOT * 1.5;
            MapFeature::line(
                500 + row,
                vec![
                    DVec2::new(ORIGIN.x - PITCH, y),
                    DVec2::new(ORIGIN.x + GRID as f64 * PITCH, y),
                ],
            )
        })
        .collect();
    surface.insert_layer(ROAD_LAYER, roads);
    surface.register_source(PARTICLE_SOURCE);
    surface.set_ready(true);
    surface
}

fn load_boundaries(surface: &mut MemorySurface) {
    // Disjoint synthetic id ranges per collection.
    let districts = parse_boundaries(DISTRICTS, 1000).expect("district boundaries are well formed");
    let blocks = parse_boundaries(BLOCKS, 2000).expect("block boundaries are well formed");
    surface.insert_layer(PRIMARY_BOUNDARY_SOURCE, districts);
    surface.insert_layer(SECONDARY_BOUNDARY_SOURCE, blocks);
}

#[derive(Resource, Default)]
struct DemoScript {
    frame: u64,
}

/// Scripted interaction session standing in for a live user.
fn drive_demo(
    mut script: ResMut<DemoScript>,
    surface: Res<SurfaceHandle>,
    mut camera: EventWriter<CameraMoved>,
    mut moved: EventWriter<PointerMoved>,
    mut clicked: EventWriter<PointerClicked>,
    mut left: EventWriter<PointerLeft>,
    mut exit: EventWriter<AppExit>,
) {
    script.frame += 1;
    match script.frame {
        5 => {
            camera.send(CameraMoved { zoom: 15.0 });
        }
        30 => {
            moved.send(PointerMoved {
                position: DVec2::new(-77.0190, 38.9010),
            });
        }
        45 => {
            clicked.send(PointerClicked {
                position: ORIGIN + DVec2::new(LOT / 2.0, LOT / 2.0),
            });
        }
        60 => {
            left.send(PointerLeft);
        }
        75 => {
            camera.send(CameraMoved { zoom: 11.0 });
        }
        90 => {
            let mem: &MemorySurface = surface
                .0
                .as_any()
                .downcast_ref()
                .expect("demo runs on the in-memory surface");
            info!(
                "session done: {} publishes, {} particles live, {} popups open",
                mem.publish_count(),
                mem.source_points(PARTICLE_SOURCE).map_or(0, |p| p.len()),
                mem.active_popup_count()
            );
            exit.send(AppExit::Success);
        }
        _ => {}
    }
}

fn main() {
    let mut surface = synthetic_city();
    load_boundaries(&mut surface);

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(
                std::time::Duration::from_millis(16),
            )),
            LogPlugin::default(),
        ))
        .add_plugins((EnginePlugin, OverlayPlugin))
        .insert_resource(SurfaceHandle::new(surface))
        .insert_resource(ProximityIndex::new(vec![
            ReferenceNode::new("substation-north", ORIGIN + DVec2::new(0.002, 0.004), 1.0),
            ReferenceNode::new("substation-south", ORIGIN + DVec2::new(0.004, 0.001), 0.7),
            ReferenceNode::new("hub-central", ORIGIN + DVec2::new(0.003, 0.003), 0.9),
        ]))
        .init_resource::<DemoScript>()
        .add_systems(Update, drive_demo)
        .run();
}
