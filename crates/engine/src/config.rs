//! Tuning constants for classification, particle flow, and scheduling.
//!
//! All spatial constants are expressed in raw lon/lat degrees. The whole
//! subsystem works on a single city's bounding box, so planar math over
//! degrees is an accepted approximation (see `geometry`).

/// Source layer holding extruded building footprints.
pub const BUILDING_LAYER: &str = "3d-buildings";

/// Source layer holding the road centerlines that emit particles.
pub const ROAD_LAYER: &str = "road-simple";

/// GeoJSON source the particle field is published into each tick.
pub const PARTICLE_SOURCE: &str = "flow-particles";

/// Source backing the primary (district-level) boundary polygons.
pub const PRIMARY_BOUNDARY_SOURCE: &str = "district-boundaries";

/// Source backing the secondary (block-level) boundary polygons.
pub const SECONDARY_BOUNDARY_SOURCE: &str = "block-boundaries";

/// Minimum viewport zoom at which the animation runs at all.
pub const MIN_ACTIVE_ZOOM: f64 = 13.0;

/// Coarse throttle: process every Nth frame while running.
pub const FRAME_SKIP: u64 = 2;

/// Fine throttle: minimum wall-clock time between processed frames.
pub const THROTTLE_MS: u64 = 50;

/// Search radius (degrees) for reference-node connection checks.
pub const CONNECT_RADIUS: f64 = 0.002;

/// Slope converting distance-to-primary into connection intensity:
/// `intensity = 1 - distance * INTENSITY_FALLOFF`, clamped to [0, 1].
pub const INTENSITY_FALLOFF: f64 = 500.0;

/// Minimum height for the primary ("efficient") classification.
pub const PRIMARY_MIN_HEIGHT: f64 = 10.0;

/// Height modulus for the primary classification. Deterministic so the
/// same building classifies identically on every pass.
pub const PRIMARY_HEIGHT_MODULUS: f64 = 4.0;

/// Base probability gate deciding whether a non-primary feature even runs
/// the proximity scan. Bounds how many features pay for the scan.
pub const GATE_BASE: f64 = 0.55;

/// Extra gate for large features (height > 30, area > 1000).
pub const GATE_LARGE: f64 = 0.3;

/// Height threshold for the large-feature gate.
pub const GATE_LARGE_HEIGHT: f64 = 30.0;

/// Area threshold for the large-feature gate.
pub const GATE_LARGE_AREA: f64 = 1000.0;

/// Probability that an unconnected, non-primary feature is negative.
pub const NEGATIVE_PROBABILITY: f64 = 0.15;

/// Base influence radius (degrees) a size-1 target projects onto roads.
pub const INFLUENCE_RADIUS: f64 = 0.006;

/// Fade window start, per unit of target size factor.
pub const FADE_START: f64 = 0.0002;

/// Fade window end, per unit of target size factor.
pub const FADE_END: f64 = 0.006;

/// Reference height for the target size factor.
pub const SIZE_HEIGHT_REF: f64 = 20.0;

/// Exponent for the height term of the size factor.
pub const SIZE_HEIGHT_EXP: f64 = 1.5;

/// Reference area for the target size factor.
pub const SIZE_AREA_REF: f64 = 1000.0;

/// Exponent for the area term of the size factor.
pub const SIZE_AREA_EXP: f64 = 1.3;

/// Clamp range for the combined size factor.
pub const SIZE_FACTOR_MIN: f64 = 1.0;
pub const SIZE_FACTOR_MAX: f64 = 6.0;

/// Every Nth sampled point also emits a perpendicular carrier pair.
pub const CARRIER_EVERY: usize = 3;

/// Hard cap on points in one published field. The generator truncates
/// rather than exceed this, so frame cost stays bounded at any zoom.
pub const MAX_FIELD_POINTS: usize = 4000;

/// Cap on primary targets processed per tick.
pub const MAX_TARGETS: usize = 64;

/// Cap on samples drawn from a single road segment.
pub const MAX_SEGMENT_SAMPLES: usize = 120;

/// Seconds to wait for the surface to report ready before proceeding
/// anyway. Keeps the pipeline from deadlocking on a signal that may
/// never fire.
pub const READY_TIMEOUT_SECS: f32 = 5.0;
