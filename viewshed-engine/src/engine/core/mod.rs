//! Core application setup.
//!
//! Handles window configuration and plugin initialisation for both native
//! and WASM targets.

/// Application setup and plugin configuration for the Bevy engine.
///
/// Creates the main app with the viewshed, tool and RPC plugins, lighting,
/// and the native FPS overlay.
pub mod app_setup;
