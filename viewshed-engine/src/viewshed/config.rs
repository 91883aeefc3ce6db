use bevy::prelude::*;
use constants::viewshed::{
    DEFAULT_ASPECT_RATIO, DEFAULT_EYE_HEIGHT, DEFAULT_FOV_DEGREES, DEFAULT_RANGE, NEAR_PLANE,
};
use serde::{Deserialize, Serialize};

use super::frustum::{Frustum, ViewshedColors, clamp_range};
use super::height_mode::HeightMode;

/// Defaults for newly created viewsheds. Loadable from a `*.viewshed.json` asset;
/// missing fields fall back to the built-in constants.
#[derive(Asset, TypePath, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewshedConfig {
    pub colors: ViewshedColors,
    pub eye_height: f64,
    pub default_range: f64,
    pub default_fov: f64,
    pub near_plane: f64,
    pub aspect_ratio: f64,
    pub height_mode: HeightMode,
}

impl Default for ViewshedConfig {
    fn default() -> Self {
        Self {
            colors: ViewshedColors::default(),
            eye_height: DEFAULT_EYE_HEIGHT,
            default_range: DEFAULT_RANGE,
            default_fov: DEFAULT_FOV_DEGREES,
            near_plane: NEAR_PLANE,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            height_mode: HeightMode::Absolute,
        }
    }
}

impl ViewshedConfig {
    pub fn frustum(&self) -> Frustum {
        Frustum {
            fov: self.default_fov,
            near: self.near_plane,
            far: clamp_range(self.default_range),
            aspect_ratio: self.aspect_ratio,
        }
    }
}
