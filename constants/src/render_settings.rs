pub const MARKER_APEX_SPHERE_SIZE: f32 = 0.6;
pub const MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE: f32 = 0.125;

/// Circle segments used when outlining the range of an omnidirectional viewshed.
pub const MARKER_FAR_PLANE_SEGMENTS: usize = 32;

pub const MARKER_COLOR: [f32; 4] = [1.0, 0.85, 0.2, 1.0];
pub const TERRAIN_GRID_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.25];

/// Pointer travel in pixels before a press becomes a drag.
pub const DRAG_THRESHOLD_PX: f32 = 4.0;
