//! Mapping between geographic positions and Bevy world space.
//!
//! The scene is a local tangent plane anchored at an origin: world X is east,
//! world Y is up and world -Z is north (see `constants::coordinate_system`).

use bevy::math::DVec3;
use bevy::prelude::*;
use constants::coordinate_system::{enu_to_world, world_to_enu};

use crate::viewshed::geodesy::{Cartographic, LocalFrame};

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SceneFrame {
    origin: Cartographic,
    frame: LocalFrame,
}

impl SceneFrame {
    pub fn new(origin: Cartographic) -> Self {
        Self {
            origin,
            frame: LocalFrame::at(origin),
        }
    }

    pub fn origin(&self) -> Cartographic {
        self.origin
    }

    pub fn to_world(&self, position: Cartographic) -> Vec3 {
        self.ecef_to_world(position.to_ecef())
    }

    pub fn ecef_to_world(&self, point: DVec3) -> Vec3 {
        self.direction_to_world(point - self.frame.origin)
    }

    /// Rotate an ECEF vector into world axes without translating it.
    pub fn direction_to_world(&self, vector: DVec3) -> Vec3 {
        let local = self.frame.to_local(vector);
        let (x, y, z) = enu_to_world(local.x, local.y, local.z);
        Vec3::new(x as f32, y as f32, z as f32)
    }

    pub fn to_cartographic(&self, world: Vec3) -> Cartographic {
        let (east, north, up) = world_to_enu(world.x as f64, world.y as f64, world.z as f64);
        let offset = self.frame.to_ecef_vector(DVec3::new(east, north, up));
        Cartographic::from_ecef(self.frame.origin + offset)
    }
}

impl Default for SceneFrame {
    fn default() -> Self {
        Self::new(Cartographic::new(8.54, 47.37, 400.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_world_zero() {
        let frame = SceneFrame::default();
        assert!(frame.to_world(frame.origin()).length() < 1e-3);
    }

    #[test]
    fn north_is_negative_z_and_up_is_y() {
        let frame = SceneFrame::new(Cartographic::new(0.0, 0.0, 0.0));
        let north = frame.to_world(Cartographic::new(0.0, 0.001, 0.0));
        assert!(north.z < -100.0);
        assert!(north.x.abs() < 1e-2);

        let up = frame.to_world(Cartographic::new(0.0, 0.0, 50.0));
        assert!((up.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn world_round_trip() {
        let frame = SceneFrame::default();
        let p = Cartographic::new(8.541, 47.369, 455.0);
        let back = frame.to_cartographic(frame.to_world(p));
        assert!((back.longitude - p.longitude).abs() < 1e-6);
        assert!((back.latitude - p.latitude).abs() < 1e-6);
        assert!((back.height - p.height).abs() < 0.05);
    }
}
