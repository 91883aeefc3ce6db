/// Smallest far-plane distance a viewshed may have, in metres.
pub const MIN_RANGE: f64 = 10.0;

/// Eye height above ground used for terrain-relative observers.
pub const DEFAULT_EYE_HEIGHT: f64 = 1.8;

pub const DEFAULT_RANGE: f64 = 100.0;
pub const DEFAULT_FOV_DEGREES: f64 = 45.0;
pub const NEAR_PLANE: f64 = 0.1;
pub const DEFAULT_ASPECT_RATIO: f64 = 1.0;

/// RGBA, 0..1
pub const DEFAULT_VISIBLE_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 0.5];
pub const DEFAULT_OCCLUDED_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 0.5];
