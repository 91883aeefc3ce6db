//! Durable store of named viewsheds.

use bevy::log::info;
use serde::{Deserialize, Serialize};

use super::entity::{ViewshedEntity, ViewshedId, ViewshedKind};
use super::error::ViewshedError;
use super::snapshot::ViewshedSnapshot;

const COLLECTION_SCHEMA: &str = "viewshed.collection.v1";

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    Added(ViewshedId),
    Removed(ViewshedId),
    Renamed { id: ViewshedId, title: String },
    VisibilityChanged { id: ViewshedId, visible: bool },
}

#[derive(Debug)]
struct CollectionEntry {
    entity: ViewshedEntity,
    visible: bool,
}

/// Export/import document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionFile {
    pub schema: String,
    pub viewsheds: Vec<ViewshedSnapshot>,
}

#[derive(Debug, Default)]
pub struct ViewshedCollection {
    entries: Vec<CollectionEntry>,
    events: Vec<CollectionEvent>,
}

impl ViewshedCollection {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ViewshedId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: ViewshedId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.entity.id() == id)
    }

    /// Smallest unused `<kind>-<n>` title, probing from 1.
    pub fn next_title(&self, kind: ViewshedKind) -> String {
        (1..)
            .map(|n| format!("{}-{}", kind.as_str(), n))
            .find(|title| {
                !self.entries.iter().any(|entry| {
                    entry.entity.kind() == kind
                        && entry.entity.persisted_title() == Some(title.as_str())
                })
            })
            .unwrap_or_else(|| format!("{}-{}", kind.as_str(), self.entries.len() + 1))
    }

    /// Store `entity`, titling it if it has no title yet. Returns the title.
    pub fn add(&mut self, mut entity: ViewshedEntity, visible: bool) -> String {
        let title = match entity.persisted_title() {
            Some(title) => title.to_string(),
            None => self.next_title(entity.kind()),
        };
        entity.set_persisted_title(Some(title.clone()));
        let id = entity.id();
        self.entries.push(CollectionEntry { entity, visible });
        self.events.push(CollectionEvent::Added(id));
        info!("Viewshed {} stored as '{}'", id, title);
        title
    }

    pub fn remove(&mut self, id: ViewshedId) -> Option<ViewshedEntity> {
        let index = self.position(id)?;
        let mut entry = self.entries.remove(index);
        entry.entity.unbind();
        entry.entity.set_persisted_title(None);
        self.events.push(CollectionEvent::Removed(id));
        Some(entry.entity)
    }

    pub fn rename(&mut self, id: ViewshedId, title: impl Into<String>) -> Result<(), ViewshedError> {
        let title = title.into();
        let index = self
            .position(id)
            .ok_or(ViewshedError::UnknownViewshed(id))?;
        self.entries[index]
            .entity
            .set_persisted_title(Some(title.clone()));
        self.events.push(CollectionEvent::Renamed { id, title });
        Ok(())
    }

    pub fn is_visible(&self, id: ViewshedId) -> bool {
        self.position(id)
            .is_some_and(|index| self.entries[index].visible)
    }

    pub fn set_visible(&mut self, id: ViewshedId, visible: bool) -> Result<(), ViewshedError> {
        let index = self
            .position(id)
            .ok_or(ViewshedError::UnknownViewshed(id))?;
        if self.entries[index].visible != visible {
            self.entries[index].visible = visible;
            self.events
                .push(CollectionEvent::VisibilityChanged { id, visible });
        }
        Ok(())
    }

    pub fn get(&self, id: ViewshedId) -> Option<&ViewshedEntity> {
        self.position(id).map(|index| &self.entries[index].entity)
    }

    pub fn get_mut(&mut self, id: ViewshedId) -> Option<&mut ViewshedEntity> {
        let index = self.position(id)?;
        Some(&mut self.entries[index].entity)
    }

    pub fn find_by_title(&self, title: &str) -> Option<ViewshedId> {
        self.entries
            .iter()
            .find(|entry| entry.entity.persisted_title() == Some(title))
            .map(|entry| entry.entity.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewshedEntity> {
        self.entries.iter().map(|entry| &entry.entity)
    }

    pub fn drain_events(&mut self) -> Vec<CollectionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn export_json(&self) -> Result<String, ViewshedError> {
        let file = CollectionFile {
            schema: COLLECTION_SCHEMA.into(),
            viewsheds: self.iter().map(ViewshedEntity::to_snapshot).collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Append every viewshed from an exported document. Titles that clash
    /// with stored ones are replaced by fresh titles. Returns the new ids.
    pub fn import_json(&mut self, s: &str) -> Result<Vec<ViewshedId>, ViewshedError> {
        let file: CollectionFile = serde_json::from_str(s)?;
        if file.schema != COLLECTION_SCHEMA {
            return Err(ViewshedError::Schema(file.schema));
        }

        let mut added = Vec::with_capacity(file.viewsheds.len());
        for snapshot in &file.viewsheds {
            let mut entity = ViewshedEntity::from_snapshot(snapshot)?;
            if entity
                .persisted_title()
                .is_some_and(|title| self.find_by_title(title).is_some())
            {
                entity.set_persisted_title(None);
            }
            added.push(entity.id());
            self.add(entity, false);
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewshed::entity::ViewshedOptions;

    fn entity(kind: ViewshedKind) -> ViewshedEntity {
        ViewshedEntity::new(kind, ViewshedOptions::default()).unwrap()
    }

    #[test]
    fn titles_probe_for_smallest_free_number() {
        let mut collection = ViewshedCollection::default();
        assert_eq!(collection.add(entity(ViewshedKind::Cone), true), "cone-1");
        let second = entity(ViewshedKind::Cone);
        let second_id = second.id();
        assert_eq!(collection.add(second, true), "cone-2");
        assert_eq!(collection.next_title(ViewshedKind::Cone), "cone-3");

        collection.remove(second_id);
        assert_eq!(collection.next_title(ViewshedKind::Cone), "cone-2");
    }

    #[test]
    fn titles_are_counted_per_kind() {
        let mut collection = ViewshedCollection::default();
        collection.add(entity(ViewshedKind::Cone), true);
        assert_eq!(
            collection.add(entity(ViewshedKind::Omnidirectional), true),
            "omnidirectional-1"
        );
    }

    #[test]
    fn events_are_reported_once() {
        let mut collection = ViewshedCollection::default();
        let e = entity(ViewshedKind::Cone);
        let id = e.id();
        collection.add(e, true);
        collection.set_visible(id, true).unwrap();
        collection.set_visible(id, false).unwrap();
        collection.rename(id, "tower").unwrap();

        assert_eq!(
            collection.drain_events(),
            vec![
                CollectionEvent::Added(id),
                CollectionEvent::VisibilityChanged { id, visible: false },
                CollectionEvent::Renamed {
                    id,
                    title: "tower".into()
                },
            ]
        );
        assert!(collection.drain_events().is_empty());
        assert!(matches!(
            collection.rename(ViewshedId(u64::MAX), "x"),
            Err(ViewshedError::UnknownViewshed(_))
        ));
    }

    #[test]
    fn export_import_round_trip_renames_clashes() {
        let mut collection = ViewshedCollection::default();
        collection.add(entity(ViewshedKind::Cone), true);
        let json = collection.export_json().unwrap();

        let mut other = ViewshedCollection::default();
        other.import_json(&json).unwrap();
        assert_eq!(other.iter().next().and_then(|e| e.persisted_title()), Some("cone-1"));

        collection.import_json(&json).unwrap();
        let titles: Vec<_> = collection
            .iter()
            .filter_map(|e| e.persisted_title().map(str::to_string))
            .collect();
        assert_eq!(titles, vec!["cone-1", "cone-2"]);
    }

    #[test]
    fn import_rejects_foreign_schema() {
        let mut collection = ViewshedCollection::default();
        let result = collection.import_json(r#"{"schema":"other","viewsheds":[]}"#);
        assert!(matches!(result, Err(ViewshedError::Schema(_))));
    }
}
