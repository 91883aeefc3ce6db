use bevy::asset::LoadState;
use bevy::prelude::*;

use crate::viewshed::config::ViewshedConfig;
use crate::viewshed::manager::ViewshedManager;

pub const DEFAULT_CONFIG_PATH: &str = "default.viewshed.json";

/// Tracks the viewshed defaults asset until it has been handed to the manager.
#[derive(Resource, Debug)]
pub struct ConfigLoader {
    path: String,
    handle: Option<Handle<ViewshedConfig>>,
    applied: bool,
}

impl ConfigLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            applied: false,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}

pub fn start_config_loading(mut loader: ResMut<ConfigLoader>, asset_server: Res<AssetServer>) {
    let handle = asset_server.load(loader.path.clone());
    loader.handle = Some(handle);
}

/// Apply the loaded defaults once; a missing or malformed file keeps the built-ins.
pub fn apply_loaded_config(
    mut loader: ResMut<ConfigLoader>,
    asset_server: Res<AssetServer>,
    configs: Res<Assets<ViewshedConfig>>,
    mut manager: ResMut<ViewshedManager>,
) {
    if loader.applied {
        return;
    }
    let Some(handle) = loader.handle.clone() else {
        return;
    };

    if let Some(config) = configs.get(&handle) {
        info!("✓ Viewshed defaults loaded from {}", loader.path);
        manager.apply_config(config.clone());
        loader.applied = true;
    } else if let Some(LoadState::Failed(err)) = asset_server.get_load_state(&handle) {
        warn!(
            "Could not load viewshed defaults from {}: {err}; using built-in defaults",
            loader.path
        );
        loader.applied = true;
    }
}
