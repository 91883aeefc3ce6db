//! Absolute vs terrain-relative observer heights.
//!
//! Switching an edited viewshed to relative mode needs the terrain height
//! under it, which arrives asynchronously. Every request carries a token made
//! of the viewshed id, the manager generation it was issued in and a serial;
//! a completion whose token no longer matches is dropped.

use bevy::log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::entity::{ViewshedEntity, ViewshedId};
use super::error::ViewshedError;
use super::geodesy::Cartographic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeightMode {
    #[default]
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainToken {
    pub viewshed: ViewshedId,
    generation: u64,
    serial: u64,
}

/// Terrain heights wanted for `coordinates`; answered via the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainRequest {
    pub token: TerrainToken,
    pub coordinates: Vec<Cartographic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeightSwitch {
    Unchanged,
    Applied,
    Pending(TerrainRequest),
}

#[derive(Debug)]
pub struct HeightModeResolver {
    mode: HeightMode,
    eye_height: f64,
    serial: u64,
    pending: Option<TerrainToken>,
}

impl HeightModeResolver {
    pub fn new(mode: HeightMode, eye_height: f64) -> Self {
        Self {
            mode,
            eye_height,
            serial: 0,
            pending: None,
        }
    }

    pub fn mode(&self) -> HeightMode {
        self.mode
    }

    pub fn set_eye_height(&mut self, eye_height: f64) {
        self.eye_height = eye_height;
    }

    pub fn pending(&self) -> Option<TerrainToken> {
        self.pending
    }

    pub fn cancel(&mut self) {
        if self.pending.take().is_some() {
            debug!("Pending terrain request cancelled");
        }
    }

    /// Height offset for a newly created viewshed in the current mode.
    pub fn default_offset(&self) -> f64 {
        match self.mode {
            HeightMode::Absolute => 0.0,
            HeightMode::Relative => self.eye_height,
        }
    }

    /// Adopt the mode an existing viewshed was stored in.
    pub fn infer(&mut self, entity: &ViewshedEntity) {
        self.cancel();
        self.mode = if entity.height_offset() != 0.0 {
            HeightMode::Relative
        } else {
            HeightMode::Absolute
        };
    }

    /// Create-mode toggle: the observer still follows the cursor on the
    /// ground, so only the offset changes.
    pub fn switch_create(
        &mut self,
        entity: Option<&mut ViewshedEntity>,
        mode: HeightMode,
    ) -> HeightSwitch {
        self.cancel();
        if mode == self.mode {
            return HeightSwitch::Unchanged;
        }
        self.mode = mode;
        if let Some(entity) = entity {
            entity.set_height_offset(self.default_offset());
        }
        info!("Height mode set to {:?}", mode);
        HeightSwitch::Applied
    }

    /// Edit-mode toggle. Relative -> absolute folds the offset into the
    /// height at once; absolute -> relative needs the terrain height first.
    pub fn begin_edit_switch(
        &mut self,
        entity: &mut ViewshedEntity,
        mode: HeightMode,
        generation: u64,
    ) -> Result<HeightSwitch, ViewshedError> {
        // A newer choice always supersedes an unanswered terrain request.
        self.cancel();
        if mode == self.mode {
            return Ok(HeightSwitch::Unchanged);
        }

        match mode {
            HeightMode::Absolute => {
                let apex = entity.apex();
                entity.set_position(apex)?;
                entity.set_height_offset(0.0);
                self.mode = HeightMode::Absolute;
                info!("Viewshed {} switched to absolute height", entity.id());
                Ok(HeightSwitch::Applied)
            }
            HeightMode::Relative => {
                self.serial += 1;
                let token = TerrainToken {
                    viewshed: entity.id(),
                    generation,
                    serial: self.serial,
                };
                self.pending = Some(token);
                debug!("Querying terrain under viewshed {}", entity.id());
                Ok(HeightSwitch::Pending(TerrainRequest {
                    token,
                    coordinates: vec![entity.position()],
                }))
            }
        }
    }

    /// Apply a terrain answer. Returns false if it was stale or failed.
    pub fn complete(
        &mut self,
        token: TerrainToken,
        generation: u64,
        entity: Option<&mut ViewshedEntity>,
        result: Result<Vec<Cartographic>, ViewshedError>,
    ) -> bool {
        let Some(entity) = entity.filter(|entity| {
            self.pending == Some(token)
                && token.generation == generation
                && entity.id() == token.viewshed
        }) else {
            debug!("Discarding stale terrain result for {}", token.viewshed);
            return false;
        };
        self.pending = None;

        let terrain = match result {
            Ok(coordinates) => match coordinates.first() {
                Some(coordinate) => coordinate.height,
                None => {
                    warn!("Terrain query returned no heights");
                    return false;
                }
            },
            Err(e) => {
                warn!("Terrain query failed: {e}");
                return false;
            }
        };

        let height = entity.apex().height;
        let ground = entity.position().with_height(terrain);
        if let Err(e) = entity.set_position(ground) {
            warn!("Terrain height rejected: {e}");
            return false;
        }
        entity.set_height_offset(height - terrain);
        self.mode = HeightMode::Relative;
        info!(
            "Viewshed {} switched to relative height (offset {:.2})",
            entity.id(),
            height - terrain
        );
        true
    }
}
