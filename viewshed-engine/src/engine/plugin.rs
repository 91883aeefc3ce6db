use std::sync::Arc;

use bevy::prelude::*;
use bevy_common_assets::json::JsonAssetPlugin;

use super::camera::{ViewportCamera, camera_controller, spawn_camera};
use super::config_loader::{ConfigLoader, apply_loaded_config, start_config_loading};
use super::markers::{draw_markers, draw_pointer_hover, draw_shadow_source, draw_terrain_grid};
use super::picking::{PointerHover, PointerTracker, emit_pointer_events};
use super::scene_frame::SceneFrame;
use super::terrain::{
    HeightmapTerrain, SceneTerrain, TerrainProvider, poll_terrain_queries, spawn_terrain_queries,
};
use crate::viewshed::config::ViewshedConfig;
use crate::viewshed::geodesy::Cartographic;
use crate::viewshed::manager::{ViewshedEvent, ViewshedManager};
use crate::viewshed::surface::{RenderSurface, SurfaceId};

const PROCEDURAL_HALF_EXTENT_DEGREES: f64 = 0.004;
const PROCEDURAL_RESOLUTION: usize = 65;

/// Scene frame, terrain, viewshed manager and the systems that drive them.
pub struct ViewshedPlugin {
    pub origin: Cartographic,
    pub terrain: Arc<HeightmapTerrain>,
}

impl ViewshedPlugin {
    pub fn new(origin: Cartographic, terrain: HeightmapTerrain) -> Self {
        Self {
            origin,
            terrain: Arc::new(terrain),
        }
    }
}

impl Default for ViewshedPlugin {
    fn default() -> Self {
        let origin = SceneFrame::default().origin();
        Self::new(
            origin,
            HeightmapTerrain::procedural(
                origin,
                PROCEDURAL_HALF_EXTENT_DEGREES,
                PROCEDURAL_RESOLUTION,
            ),
        )
    }
}

impl Plugin for ViewshedPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(JsonAssetPlugin::<ViewshedConfig>::new(&["viewshed.json"]))
            .add_event::<ViewshedEvent>()
            .insert_resource(SceneFrame::new(self.origin))
            .insert_resource(SceneTerrain(self.terrain.clone()))
            .insert_resource(TerrainProvider(self.terrain.clone()))
            .insert_resource(ViewshedManager::new(
                RenderSurface::new(SurfaceId(0)),
                ViewshedConfig::default(),
            ))
            .init_resource::<ViewportCamera>()
            .init_resource::<PointerTracker>()
            .init_resource::<PointerHover>()
            .init_resource::<ConfigLoader>()
            .add_systems(Startup, (start_config_loading, spawn_camera))
            .add_systems(
                Update,
                (
                    apply_loaded_config,
                    tick_manager,
                    emit_pointer_events,
                    process_surface_changes,
                    spawn_terrain_queries,
                    poll_terrain_queries,
                    publish_manager_events,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    camera_controller,
                    draw_terrain_grid,
                    draw_markers,
                    draw_shadow_source,
                    draw_pointer_hover,
                ),
            );
    }
}

/// Finish deferred work such as a queued `create_viewshed`.
pub fn tick_manager(mut manager: ResMut<ViewshedManager>) {
    if let Err(err) = manager.tick() {
        error!("Viewshed update failed: {err}");
    }
}

/// Unbind the current viewshed when something else took over the shadow slot.
pub fn process_surface_changes(mut manager: ResMut<ViewshedManager>) {
    if manager.process_surface_changes() {
        info!("Viewshed shadow source preempted; current viewshed stopped");
    }
}

pub fn publish_manager_events(
    mut manager: ResMut<ViewshedManager>,
    mut events: EventWriter<ViewshedEvent>,
) {
    for event in manager.drain_events() {
        events.write(event);
    }
}
