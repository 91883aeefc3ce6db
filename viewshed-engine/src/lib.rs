//! Interactive viewshed analysis for a 3D terrain scene.
//!
//! - [`viewshed`] is the engine-agnostic core (entities, manager, sessions).
//! - [`engine`] wires the core into Bevy: terrain, picking, drawing, camera.
//! - [`tools`] turns keyboard shortcuts and frontend requests into manager actions.
//! - [`rpc`] is the JSON-RPC 2.0 bridge to an embedding web page.

pub mod engine;
pub mod rpc;
pub mod tools;
pub mod viewshed;
