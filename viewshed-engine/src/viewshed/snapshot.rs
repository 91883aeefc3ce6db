use serde::{Deserialize, Serialize};

use super::entity::ViewshedKind;
use super::error::ViewshedError;
use super::frustum::{Frustum, Orientation, ViewshedColors};
use super::geodesy::Cartographic;

/// Serialisable form of a viewshed. Binding state is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewshedSnapshot {
    pub kind: ViewshedKind,
    pub position: Cartographic,
    pub frustum: Frustum,
    pub orientation: Orientation,
    pub colors: ViewshedColors,
    pub show_marker: bool,
    pub height_offset: f64,
    /// Present only for entities stored in the persistent collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ViewshedSnapshot {
    pub fn to_json(&self) -> Result<String, ViewshedError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, ViewshedError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::entity::{ViewshedEntity, ViewshedOptions};
    use crate::viewshed::frustum::RgbaColor;

    #[test]
    fn entity_round_trips_through_json() {
        let mut entity = ViewshedEntity::new(
            ViewshedKind::Cone,
            ViewshedOptions {
                position: Cartographic::new(13.41, 52.52, 34.0),
                height_offset: 1.8,
                heading: 275.5,
                pitch: -12.25,
                colors: ViewshedColors {
                    visible_color: RgbaColor([0.1, 0.9, 0.2, 0.4]),
                    occluded_color: RgbaColor([0.8, 0.1, 0.1, 0.6]),
                },
                show_marker: true,
                ..Default::default()
            },
        )
        .unwrap();
        entity.set_range(321.0);
        entity.set_field_of_view(60.0);

        let json = entity.to_snapshot().to_json().unwrap();
        let restored = ViewshedEntity::from_snapshot(&ViewshedSnapshot::from_json(&json).unwrap())
            .unwrap();

        assert_eq!(restored.to_snapshot(), entity.to_snapshot());
        assert_ne!(restored.id(), entity.id());
        assert!(!restored.is_active());
    }

    #[test]
    fn schema_uses_camel_case_fields() {
        let entity =
            ViewshedEntity::new(ViewshedKind::Omnidirectional, ViewshedOptions::default()).unwrap();
        let value = serde_json::to_value(entity.to_snapshot()).unwrap();

        assert_eq!(value["kind"], "omnidirectional");
        assert!(value["frustum"]["aspectRatio"].is_number());
        assert!(value["colors"]["visibleColor"].is_array());
        assert_eq!(value["position"].as_array().map(Vec::len), Some(3));
        assert!(value.get("showMarker").is_some());
        assert!(value.get("heightOffset").is_some());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let entity = ViewshedEntity::new(ViewshedKind::Cone, ViewshedOptions::default()).unwrap();
        let mut value = serde_json::to_value(entity.to_snapshot()).unwrap();
        value["kind"] = serde_json::json!("pyramid");
        assert!(ViewshedSnapshot::from_json(&value.to_string()).is_err());
    }
}
