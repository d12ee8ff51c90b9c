//! Flow particle field generation.
//!
//! Each processed tick rebuilds the entire field from scratch: primary
//! targets project a scale-dependent influence radius onto nearby road
//! segments, and segments inside that radius are sampled into green flow
//! particles plus a sparser white carrier wave. Particles carry no
//! identity; motion is an artifact of re-sampling with fresh jitter and a
//! time-dependent carrier phase.

use bevy::color::Color;
use bevy::math::DVec2;
use rand::Rng;

use engine::config::{
    CARRIER_EVERY, FADE_END, FADE_START, INFLUENCE_RADIUS, MAX_FIELD_POINTS, MAX_SEGMENT_SAMPLES,
    MAX_TARGETS, MIN_ACTIVE_ZOOM, SIZE_AREA_EXP, SIZE_AREA_REF, SIZE_FACTOR_MAX, SIZE_FACTOR_MIN,
    SIZE_HEIGHT_EXP, SIZE_HEIGHT_REF,
};
use engine::feature::MapFeature;
use engine::surface::{FlowPoint, PointCollection};

/// Samples per unit of (segment length x fade) at full zoom factor.
const SAMPLE_BASE: f64 = 40.0;

/// Floor of the zoom factor, so some particles survive at the activation
/// threshold.
const SAMPLE_ZOOM_FLOOR: f64 = 0.2;

/// Zoom span over which the sample density ramps from floor to full.
const SAMPLE_ZOOM_RANGE: f64 = 5.0;

/// Max random perpendicular spread of a green particle (degrees).
const GREEN_SPREAD: f64 = 0.0001;

/// Axis-aligned jitter amplitude of a green particle (degrees).
const GREEN_JITTER: f64 = 0.00004;

/// Base size of a green particle.
const GREEN_SIZE: f32 = 1.2;

/// Perpendicular amplitude of the carrier wave (degrees).
const CARRIER_AMPLITUDE: f64 = 0.00005;

/// Spatial frequency of the carrier wave along a segment, in half-turns.
const CARRIER_FREQUENCY: f64 = 4.0;

/// Phase speed of the carrier wave, radians per second.
const CARRIER_WAVE_SPEED: f64 = 2.0;

/// Cycle speed of the carrier drift, cycles per second.
const CARRIER_DRIFT_SPEED: f64 = 0.5;

/// Perpendicular amplitude of the carrier drift (degrees).
const CARRIER_DRIFT_AMPLITUDE: f64 = 0.00002;

/// Base size of a carrier particle.
const CARRIER_SIZE: f32 = 2.0;

/// Fixed opacity of carrier particles.
const CARRIER_OPACITY: f32 = 0.2;

/// A primary feature projected into the particle pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowTarget {
    /// Coordinate-wise mean of the footprint ring.
    pub center: DVec2,
    /// Bounded power-law blend of height and area; scales the influence
    /// radius and the fade window.
    pub size_factor: f64,
}

impl FlowTarget {
    /// Build a target from a polygon feature. Lines and degenerate rings
    /// have no center and produce no target.
    pub fn from_feature(feature: &MapFeature) -> Option<Self> {
        Some(Self {
            center: feature.centroid()?,
            size_factor: size_factor(feature.height, feature.area()),
        })
    }
}

/// Combined size factor: taller and larger targets project further.
pub fn size_factor(height: f64, area: f64) -> f64 {
    let height_term = (height / SIZE_HEIGHT_REF).powf(SIZE_HEIGHT_EXP);
    let area_term = (area / SIZE_AREA_REF).powf(SIZE_AREA_EXP);
    (height_term + area_term).clamp(SIZE_FACTOR_MIN, SIZE_FACTOR_MAX)
}

/// Zoom-dependent sample density factor in [SAMPLE_ZOOM_FLOOR, 1].
fn zoom_factor(zoom: f64) -> f64 {
    ((zoom - MIN_ACTIVE_ZOOM) / SAMPLE_ZOOM_RANGE).max(SAMPLE_ZOOM_FLOOR)
}

/// Build the complete particle field for one tick.
///
/// `time_secs` drives the carrier phase; `rng` supplies the green-particle
/// jitter. Output is truncated at [`MAX_FIELD_POINTS`], scanning targets in
/// order, so frame cost stays bounded no matter how dense the viewport is.
pub fn generate_field(
    time_secs: f64,
    zoom: f64,
    targets: &[FlowTarget],
    roads: &[MapFeature],
    rng: &mut impl Rng,
) -> PointCollection {
    let mut field = PointCollection::default();
    let base_samples = (SAMPLE_BASE * zoom_factor(zoom)).floor();

    'targets: for target in targets.iter().take(MAX_TARGETS) {
        let influence = INFLUENCE_RADIUS * target.size_factor;
        let fade_start = FADE_START * target.size_factor;
        let fade_end = FADE_END * target.size_factor;

        for road in roads {
            let Some(points) = road.line_points() else {
                continue;
            };
            for pair in points.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let distance = a.distance(target.center);
                if distance >= influence {
                    continue;
                }

                // Unclamped on the near side: segments inside the fade
                // start get a mild boost above 1.
                let raw_fade = (distance - fade_start) / (fade_end - fade_start);
                let fade = (-raw_fade * 2.0).exp();

                let delta = b - a;
                let segment_length = delta.length();
                let perp = DVec2::new(-delta.y, delta.x);
                if perp.length() == 0.0 {
                    continue;
                }
                let perp = perp / perp.length();

                let samples = ((base_samples * segment_length * 1000.0 * (fade + 0.1)) as usize)
                    .min(MAX_SEGMENT_SAMPLES);

                for i in 0..samples {
                    if field.len() >= MAX_FIELD_POINTS {
                        break 'targets;
                    }
                    let t = i as f64 / samples as f64;
                    let on_road = a + delta * t;

                    let spread = rng.gen::<f64>() * GREEN_SPREAD * fade.sqrt();
                    let jitter = (rng.gen::<f64>() - 0.5) * GREEN_JITTER * fade;
                    field.points.push(FlowPoint {
                        position: on_road + perp * spread + DVec2::splat(jitter),
                        size: GREEN_SIZE * (fade as f32 + 0.1),
                        opacity: (0.9 * fade as f32).clamp(0.1, 0.9),
                        color: Color::srgba(
                            80.0 / 255.0,
                            220.0 / 255.0,
                            80.0 / 255.0,
                            (fade.powf(1.2) as f32).min(1.0),
                        ),
                    });

                    if i % CARRIER_EVERY == 0 {
                        let wave = CARRIER_AMPLITUDE
                            * (t * std::f64::consts::PI * CARRIER_FREQUENCY
                                + time_secs * CARRIER_WAVE_SPEED)
                                .sin();
                        let drift =
                            ((t + time_secs * CARRIER_DRIFT_SPEED).rem_euclid(1.0) - 0.5)
                                * CARRIER_DRIFT_AMPLITUDE;
                        for side in [-1.0, 1.0] {
                            if field.len() >= MAX_FIELD_POINTS {
                                break 'targets;
                            }
                            field.points.push(FlowPoint {
                                position: on_road + perp * (side * wave) + perp * drift,
                                size: CARRIER_SIZE * (fade as f32 + 0.1),
                                opacity: CARRIER_OPACITY,
                                color: Color::srgba(
                                    1.0,
                                    1.0,
                                    1.0,
                                    (fade.powf(1.1) as f32).min(1.0),
                                ),
                            });
                        }
                    }
                }
            }
        }
    }

    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square_target(center: DVec2, height: f64) -> FlowTarget {
        let half = 0.0001;
        let feature = MapFeature::polygon(
            1,
            vec![
                DVec2::new(center.x - half, center.y - half),
                DVec2::new(center.x + half, center.y - half),
                DVec2::new(center.x + half, center.y + half),
                DVec2::new(center.x - half, center.y + half),
            ],
        )
        .with_height(height);
        FlowTarget::from_feature(&feature).unwrap()
    }

    fn road_through(x0: f64, x1: f64, y: f64) -> MapFeature {
        MapFeature::line(2, vec![DVec2::new(x0, y), DVec2::new(x1, y)])
    }

    #[test]
    fn test_size_factor_bounds() {
        assert_eq!(size_factor(0.0, 0.0), SIZE_FACTOR_MIN);
        assert_eq!(size_factor(500.0, 100_000.0), SIZE_FACTOR_MAX);
        let mid = size_factor(40.0, 2000.0);
        assert!(mid > SIZE_FACTOR_MIN && mid < SIZE_FACTOR_MAX);
    }

    #[test]
    fn test_taller_targets_project_further() {
        assert!(size_factor(60.0, 0.0) > size_factor(20.0, 0.0));
    }

    #[test]
    fn test_road_inside_influence_produces_particles() {
        let target = square_target(DVec2::ZERO, 20.0);
        let roads = vec![road_through(-0.002, 0.002, 0.0005)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let field = generate_field(0.0, 15.0, &[target], &roads, &mut rng);
        assert!(!field.is_empty());
        assert!(field.len() <= MAX_FIELD_POINTS);
    }

    #[test]
    fn test_distant_road_produces_nothing() {
        let target = square_target(DVec2::ZERO, 20.0);
        let roads = vec![road_through(0.5, 0.6, 0.5)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let field = generate_field(0.0, 15.0, &[target], &roads, &mut rng);
        assert!(field.is_empty());
    }

    #[test]
    fn test_no_targets_or_roads_is_empty() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(generate_field(0.0, 15.0, &[], &[], &mut rng).is_empty());
        let target = square_target(DVec2::ZERO, 20.0);
        assert!(generate_field(0.0, 15.0, &[target], &[], &mut rng).is_empty());
    }

    #[test]
    fn test_higher_zoom_samples_more_densely() {
        let target = square_target(DVec2::ZERO, 20.0);
        let roads = vec![road_through(-0.002, 0.002, 0.0005)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let low = generate_field(0.0, 13.5, &[target], &roads, &mut rng);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let high = generate_field(0.0, 17.0, &[target], &roads, &mut rng);
        assert!(high.len() > low.len());
    }

    #[test]
    fn test_fade_dims_particles_with_distance() {
        let target = square_target(DVec2::ZERO, 20.0);
        let near = vec![road_through(-0.002, 0.002, 0.0004)];
        let far = vec![road_through(-0.002, 0.002, 0.004)];
        let max_opacity = |roads: &[MapFeature]| {
            let mut rng = ChaCha8Rng::seed_from_u64(9);
            generate_field(0.0, 15.0, &[target], roads, &mut rng)
                .points
                .iter()
                .map(|p| p.opacity)
                .fold(0.0f32, f32::max)
        };
        let near_max = max_opacity(&near);
        let far_max = max_opacity(&far);
        assert!(near_max > 0.0);
        assert!(far_max > 0.0);
        assert!(near_max > far_max);
    }

    #[test]
    fn test_carrier_particles_are_white_and_sparser() {
        let target = square_target(DVec2::ZERO, 20.0);
        let roads = vec![road_through(-0.002, 0.002, 0.0005)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let field = generate_field(1.5, 15.0, &[target], &roads, &mut rng);
        let carriers = field
            .points
            .iter()
            .filter(|p| p.opacity == CARRIER_OPACITY && p.size > GREEN_SIZE)
            .count();
        let greens = field.len() - carriers;
        assert!(carriers > 0);
        assert!(greens > carriers / 2);
    }

    #[test]
    fn test_carrier_phase_moves_with_time() {
        let target = square_target(DVec2::ZERO, 20.0);
        let roads = vec![road_through(-0.002, 0.002, 0.0005)];
        let field_at = |time: f64| {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            generate_field(time, 15.0, &[target], &roads, &mut rng)
        };
        let early = field_at(0.0);
        let late = field_at(0.7);
        assert_eq!(early.len(), late.len());
        assert_ne!(early, late);
    }

    #[test]
    fn test_field_respects_hard_cap() {
        // Many large targets over a dense grid of roads.
        let targets: Vec<FlowTarget> = (0..20)
            .map(|i| square_target(DVec2::new(i as f64 * 0.0001, 0.0), 120.0))
            .collect();
        let roads: Vec<MapFeature> = (0..40)
            .map(|i| road_through(-0.003, 0.003, i as f64 * 0.0001))
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let field = generate_field(0.0, 18.0, &targets, &roads, &mut rng);
        assert_eq!(field.len(), MAX_FIELD_POINTS);
    }
}
