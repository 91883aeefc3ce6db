//! WGS84 helpers: geographic <-> earth-centred earth-fixed coordinates and
//! local east/north/up frames.

use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use super::error::ViewshedError;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Geographic coordinate: longitude and latitude in degrees, height in metres
/// above the ellipsoid. Serialised as `[lon, lat, height]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "[f64; 3]", try_from = "Vec<f64>")]
pub struct Cartographic {
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl Cartographic {
    pub const fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    /// Parse a `[lon, lat, height]` slice, rejecting wrong lengths and non-finite values.
    pub fn from_slice(values: &[f64]) -> Result<Self, ViewshedError> {
        let [longitude, latitude, height] = values else {
            return Err(ViewshedError::InvalidPosition(format!(
                "{} components",
                values.len()
            )));
        };
        if !(longitude.is_finite() && latitude.is_finite() && height.is_finite()) {
            return Err(ViewshedError::InvalidPosition(format!("{values:?}")));
        }
        Ok(Self::new(*longitude, *latitude, *height))
    }

    /// Parse a JSON array, used where positions arrive untyped (RPC, snapshots).
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ViewshedError> {
        let items = value
            .as_array()
            .ok_or_else(|| ViewshedError::InvalidPosition(value.to_string()))?;
        let numbers = items
            .iter()
            .map(|v| v.as_f64())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ViewshedError::InvalidPosition(value.to_string()))?;
        Self::from_slice(&numbers)
    }

    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.longitude, self.latitude, self.height]
    }

    pub fn to_ecef(self) -> DVec3 {
        let lon = self.longitude.to_radians();
        let lat = self.latitude.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

        DVec3::new(
            (n + self.height) * cos_lat * cos_lon,
            (n + self.height) * cos_lat * sin_lon,
            (n * (1.0 - WGS84_E2) + self.height) * sin_lat,
        )
    }

    pub fn from_ecef(point: DVec3) -> Self {
        let p = (point.x * point.x + point.y * point.y).sqrt();
        let longitude = point.y.atan2(point.x);

        // Polar axis: latitude is +-90 and height is measured from the semi-minor axis.
        if p < 1e-9 {
            let b = WGS84_A * (1.0 - WGS84_E2).sqrt();
            let latitude = if point.z >= 0.0 { 90.0 } else { -90.0 };
            return Self::new(longitude.to_degrees(), latitude, point.z.abs() - b);
        }

        let mut latitude = point.z.atan2(p * (1.0 - WGS84_E2));
        let mut height = 0.0;
        for _ in 0..8 {
            let sin_lat = latitude.sin();
            let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
            height = p / latitude.cos() - n;
            latitude = point.z.atan2(p * (1.0 - WGS84_E2 * n / (n + height)));
        }

        Self::new(longitude.to_degrees(), latitude.to_degrees(), height)
    }

    /// Straight-line distance in metres.
    pub fn distance(self, other: Cartographic) -> f64 {
        self.to_ecef().distance(other.to_ecef())
    }
}

impl From<Cartographic> for [f64; 3] {
    fn from(value: Cartographic) -> Self {
        value.to_array()
    }
}

impl TryFrom<Vec<f64>> for Cartographic {
    type Error = ViewshedError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

/// Orthonormal east/north/up basis at a point on the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    pub origin: DVec3,
    pub east: DVec3,
    pub north: DVec3,
    pub up: DVec3,
}

impl LocalFrame {
    pub fn at(position: Cartographic) -> Self {
        let lon = position.longitude.to_radians();
        let lat = position.latitude.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        Self {
            origin: position.to_ecef(),
            east: DVec3::new(-sin_lon, cos_lon, 0.0),
            north: DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat),
            up: DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat),
        }
    }

    /// Express an ECEF vector as (east, north, up) components.
    pub fn to_local(&self, vector: DVec3) -> DVec3 {
        DVec3::new(
            vector.dot(self.east),
            vector.dot(self.north),
            vector.dot(self.up),
        )
    }

    pub fn to_ecef_vector(&self, local: DVec3) -> DVec3 {
        self.east * local.x + self.north * local.y + self.up * local.z
    }

    /// Heading (clockwise from north) and pitch (negative below the horizon),
    /// both in degrees, of an ECEF direction. Vertical directions report heading 0.
    pub fn heading_pitch(&self, direction: DVec3) -> (f64, f64) {
        let local = self.to_local(direction);
        let horizontal = (local.x * local.x + local.y * local.y).sqrt();
        let heading = if horizontal < 1e-12 {
            0.0
        } else {
            local.x.atan2(local.y).to_degrees().rem_euclid(360.0)
        };
        let pitch = local.z.atan2(horizontal).to_degrees();
        (heading, pitch)
    }

    /// Unit ECEF direction for a heading/pitch pair in degrees.
    pub fn direction(&self, heading: f64, pitch: f64) -> DVec3 {
        let (sin_h, cos_h) = heading.to_radians().sin_cos();
        let (sin_p, cos_p) = pitch.to_radians().sin_cos();
        self.to_ecef_vector(DVec3::new(cos_p * sin_h, cos_p * cos_h, sin_p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecef_round_trip() {
        let p = Cartographic::new(13.4, 52.5, 120.0);
        let back = Cartographic::from_ecef(p.to_ecef());
        assert!((back.longitude - p.longitude).abs() < 1e-9);
        assert!((back.latitude - p.latitude).abs() < 1e-9);
        assert!((back.height - p.height).abs() < 1e-6);
    }

    #[test]
    fn equator_prime_meridian_is_on_x_axis() {
        let p = Cartographic::new(0.0, 0.0, 0.0).to_ecef();
        assert!((p.x - WGS84_A).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6 && p.z.abs() < 1e-6);
    }

    #[test]
    fn heading_pitch_matches_direction() {
        let frame = LocalFrame::at(Cartographic::new(8.0, 47.0, 400.0));
        let dir = frame.direction(135.0, -20.0);
        let (heading, pitch) = frame.heading_pitch(dir);
        assert!((heading - 135.0).abs() < 1e-9);
        assert!((pitch + 20.0).abs() < 1e-9);
    }

    #[test]
    fn straight_down_is_pitch_minus_90() {
        let frame = LocalFrame::at(Cartographic::new(0.0, 0.0, 0.0));
        let (heading, pitch) = frame.heading_pitch(-frame.up);
        assert_eq!(heading, 0.0);
        assert!((pitch + 90.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_positions_are_rejected() {
        assert!(Cartographic::from_slice(&[1.0, 2.0]).is_err());
        assert!(Cartographic::from_slice(&[1.0, f64::NAN, 0.0]).is_err());
        assert!(Cartographic::from_json(&serde_json::json!([1, "a", 2])).is_err());
        assert!(serde_json::from_str::<Cartographic>("[1.0, 2.0, 3.0, 4.0]").is_err());
        let ok: Cartographic = serde_json::from_str("[1.0, 2.0, 3.0]").unwrap();
        assert_eq!(ok, Cartographic::new(1.0, 2.0, 3.0));
    }
}
