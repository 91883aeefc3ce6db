//! Named parameter edits coming from UI forms.

use serde_json::Value;

use super::entity::ViewshedEntity;
use super::error::ViewshedError;
use super::frustum::RgbaColor;
use super::geodesy::Cartographic;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewshedParameter {
    Position(Cartographic),
    HeightOffset(f64),
    Range(f64),
    FieldOfView(f64),
    Heading(f64),
    Pitch(f64),
    ShowMarker(bool),
    VisibleColor(RgbaColor),
    OccludedColor(RgbaColor),
}

fn number(name: &str, value: &Value) -> Result<f64, ViewshedError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ViewshedError::InvalidParameter(format!("{name} expects a finite number")))
}

fn color(name: &str, value: &Value) -> Result<RgbaColor, ViewshedError> {
    serde_json::from_value::<[f32; 4]>(value.clone())
        .map(RgbaColor)
        .map_err(|_| ViewshedError::InvalidParameter(format!("{name} expects [r, g, b, a]")))
}

impl ViewshedParameter {
    /// Parse a `{name, value}` pair. Names follow the snapshot field names.
    pub fn parse(name: &str, value: &Value) -> Result<Self, ViewshedError> {
        match name {
            "position" => Ok(Self::Position(Cartographic::from_json(value)?)),
            "heightOffset" => Ok(Self::HeightOffset(number(name, value)?)),
            "range" | "far" => Ok(Self::Range(number(name, value)?)),
            "fieldOfView" | "fov" => Ok(Self::FieldOfView(number(name, value)?)),
            "heading" => Ok(Self::Heading(number(name, value)?)),
            "pitch" => Ok(Self::Pitch(number(name, value)?)),
            "showMarker" => value
                .as_bool()
                .map(Self::ShowMarker)
                .ok_or_else(|| ViewshedError::InvalidParameter("showMarker expects a bool".into())),
            "visibleColor" => Ok(Self::VisibleColor(color(name, value)?)),
            "occludedColor" => Ok(Self::OccludedColor(color(name, value)?)),
            other => Err(ViewshedError::InvalidParameter(format!(
                "unknown parameter '{other}'"
            ))),
        }
    }

    pub fn apply(self, entity: &mut ViewshedEntity) -> Result<(), ViewshedError> {
        match self {
            Self::Position(position) => entity.set_position(position)?,
            Self::HeightOffset(offset) => entity.set_height_offset(offset),
            Self::Range(range) => entity.set_range(range),
            Self::FieldOfView(fov) => entity.set_field_of_view(fov),
            Self::Heading(heading) => entity.set_heading(heading),
            Self::Pitch(pitch) => entity.set_pitch(pitch),
            Self::ShowMarker(show) => entity.set_show_marker(show),
            Self::VisibleColor(visible_color) => {
                let colors = entity.colors();
                entity.set_colors(super::frustum::ViewshedColors {
                    visible_color,
                    ..colors
                });
            }
            Self::OccludedColor(occluded_color) => {
                let colors = entity.colors();
                entity.set_colors(super::frustum::ViewshedColors {
                    occluded_color,
                    ..colors
                });
            }
        }
        Ok(())
    }
}
