use bevy::math::DVec3;
use constants::viewshed::{
    DEFAULT_ASPECT_RATIO, DEFAULT_FOV_DEGREES, DEFAULT_OCCLUDED_COLOR, DEFAULT_RANGE,
    DEFAULT_VISIBLE_COLOR, MIN_RANGE, NEAR_PLANE,
};
use serde::{Deserialize, Serialize};

/// Perspective parameters of the observer's sensor. `far` is the viewshed range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frustum {
    /// Degrees. Ignored by omnidirectional projections.
    pub fov: f64,
    pub near: f64,
    pub far: f64,
    pub aspect_ratio: f64,
}

impl Default for Frustum {
    fn default() -> Self {
        Self {
            fov: DEFAULT_FOV_DEGREES,
            near: NEAR_PLANE,
            far: DEFAULT_RANGE,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
        }
    }
}

/// Clamp a requested range to the minimum. NaN collapses to the minimum too.
pub fn clamp_range(range: f64) -> f64 {
    if range.is_nan() { MIN_RANGE } else { range.max(MIN_RANGE) }
}

/// Heading and pitch in degrees. Roll is stored only so snapshots keep the
/// full schema; every mutation path resets it to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub fn new(heading: f64, pitch: f64) -> Self {
        Self {
            heading: heading.rem_euclid(360.0),
            pitch: pitch.clamp(-90.0, 90.0),
            roll: 0.0,
        }
    }
}

/// Linear RGBA in 0..1, handed to the shadow projection untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbaColor(pub [f32; 4]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewshedColors {
    pub visible_color: RgbaColor,
    pub occluded_color: RgbaColor,
}

impl Default for ViewshedColors {
    fn default() -> Self {
        Self {
            visible_color: RgbaColor(DEFAULT_VISIBLE_COLOR),
            occluded_color: RgbaColor(DEFAULT_OCCLUDED_COLOR),
        }
    }
}

/// Shadow source installed in a surface's shadow slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowProjection {
    Perspective {
        /// ECEF apex.
        apex: DVec3,
        /// Unit ECEF principal axis.
        direction: DVec3,
        /// Unit ECEF up vector of the sensor (roll 0).
        up: DVec3,
        frustum: Frustum,
        colors: ViewshedColors,
    },
    Omnidirectional {
        apex: DVec3,
        near: f64,
        far: f64,
        colors: ViewshedColors,
    },
}

impl ShadowProjection {
    pub fn apex(&self) -> DVec3 {
        match self {
            Self::Perspective { apex, .. } | Self::Omnidirectional { apex, .. } => *apex,
        }
    }

    pub fn far(&self) -> f64 {
        match self {
            Self::Perspective { frustum, .. } => frustum.far,
            Self::Omnidirectional { far, .. } => *far,
        }
    }
}

/// Visual indicator of an observer, kept in the surface's primitive collection.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerPrimitive {
    /// Outline of a perspective frustum: apex, axis, up and far-plane extent.
    Cone {
        apex: DVec3,
        direction: DVec3,
        up: DVec3,
        fov: f64,
        aspect_ratio: f64,
        range: f64,
    },
    /// Observer position only.
    Point { apex: DVec3 },
}
