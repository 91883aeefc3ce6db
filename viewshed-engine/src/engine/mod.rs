//! Bevy integration of the viewshed core: world/geographic mapping, terrain,
//! pointer picking, gizmo drawing and the plugin wiring them together.

/// Free-flight viewport camera.
pub mod camera;

/// Loading of viewshed defaults from a JSON asset.
pub mod config_loader;

pub mod core;

pub mod markers;

/// Cursor ray to terrain picking and click/drag synthesis.
pub mod picking;

pub mod plugin;

/// Geographic position to world space mapping.
pub mod scene_frame;

/// Heightmap terrain and async terrain height queries.
pub mod terrain;
