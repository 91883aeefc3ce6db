//! Mode state machine owning the single current viewshed.
//!
//! ```text
//! NULL ──create_viewshed──> (one tick) ──> CREATE ──finished──> EDIT <──> MOVE
//!   ^                                                            │
//!   └──────────────────────────── stop ──────────────────────────┘
//! NULL/EDIT ──view_viewshed──> VIEW        selection > 1 ──> MULTI_SELECT
//! ```
//!
//! Only the current viewshed is ever bound to the surface. Switching away
//! from a persisted viewshed deactivates it; switching away from a transient
//! one destroys it.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::collection::{CollectionEvent, ViewshedCollection};
use super::config::ViewshedConfig;
use super::entity::{EntityNotice, ViewshedEntity, ViewshedId, ViewshedKind, ViewshedOptions};
use super::error::ViewshedError;
use super::geodesy::Cartographic;
use super::height_mode::{HeightMode, HeightModeResolver, HeightSwitch, TerrainRequest, TerrainToken};
use super::interaction::{PointerEvent, PositioningInteraction, PositioningNotice};
use super::parameter::ViewshedParameter;
use super::reposition::{
    EditSessionProvider, PointerEditProvider, RepositionEvent, RepositionSession,
};
use super::snapshot::ViewshedSnapshot;
use super::surface::RenderSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewshedMode {
    #[default]
    Null,
    Create,
    Edit,
    Move,
    View,
    MultiSelect,
}

/// Observable manager state changes, drained once per frame.
#[derive(Event, Debug, Clone, PartialEq)]
pub enum ViewshedEvent {
    ModeChanged(ViewshedMode),
    CurrentChanged(Option<ViewshedId>),
    Positioned(ViewshedId),
    PositionChanged {
        id: ViewshedId,
        position: Cartographic,
    },
    HeightModeChanged(HeightMode),
    Persisted {
        id: ViewshedId,
        title: String,
    },
    Collection(CollectionEvent),
    SelectionCleared,
}

/// Enough to put the manager back where it was after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerSessionState {
    pub mode: ViewshedMode,
    #[serde(default)]
    pub height_mode: HeightMode,
    #[serde(default)]
    pub current: Option<ViewshedSnapshot>,
}

fn lookup<'a>(
    transient: &'a Option<ViewshedEntity>,
    collection: &'a ViewshedCollection,
    id: ViewshedId,
) -> Option<&'a ViewshedEntity> {
    match transient {
        Some(entity) if entity.id() == id => Some(entity),
        _ => collection.get(id),
    }
}

fn lookup_mut<'a>(
    transient: &'a mut Option<ViewshedEntity>,
    collection: &'a mut ViewshedCollection,
    id: ViewshedId,
) -> Option<&'a mut ViewshedEntity> {
    match transient {
        Some(entity) if entity.id() == id => Some(entity),
        _ => collection.get_mut(id),
    }
}

#[derive(Resource)]
pub struct ViewshedManager {
    surface: RenderSurface,
    config: ViewshedConfig,
    mode: ViewshedMode,
    heights: HeightModeResolver,
    /// Bumped whenever the current viewshed changes; stale async answers carry an older value.
    generation: u64,
    current: Option<ViewshedId>,
    transient: Option<ViewshedEntity>,
    collection: ViewshedCollection,
    interaction: Option<PositioningInteraction>,
    reposition: Option<RepositionSession>,
    edit_provider: Box<dyn EditSessionProvider>,
    pending_create: Option<ViewshedKind>,
    terrain_requests: Vec<TerrainRequest>,
    selection: Vec<ViewshedId>,
    events: Vec<ViewshedEvent>,
}

impl ViewshedManager {
    pub fn new(surface: RenderSurface, config: ViewshedConfig) -> Self {
        Self {
            surface,
            heights: HeightModeResolver::new(config.height_mode, config.eye_height),
            config,
            mode: ViewshedMode::Null,
            generation: 0,
            current: None,
            transient: None,
            collection: ViewshedCollection::default(),
            interaction: None,
            reposition: None,
            edit_provider: Box::new(PointerEditProvider),
            pending_create: None,
            terrain_requests: Vec::new(),
            selection: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_edit_provider(mut self, provider: Box<dyn EditSessionProvider>) -> Self {
        self.edit_provider = provider;
        self
    }

    pub fn mode(&self) -> ViewshedMode {
        self.mode
    }

    pub fn height_mode(&self) -> HeightMode {
        self.heights.mode()
    }

    pub fn config(&self) -> &ViewshedConfig {
        &self.config
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn collection(&self) -> &ViewshedCollection {
        &self.collection
    }

    pub fn selection(&self) -> &[ViewshedId] {
        &self.selection
    }

    pub fn current_id(&self) -> Option<ViewshedId> {
        self.current
    }

    pub fn current(&self) -> Option<&ViewshedEntity> {
        lookup(&self.transient, &self.collection, self.current?)
    }

    /// Current viewshed for parameter edits; bound resources resync immediately.
    pub fn current_mut(&mut self) -> Option<&mut ViewshedEntity> {
        lookup_mut(&mut self.transient, &mut self.collection, self.current?)
    }

    pub fn is_creating(&self) -> bool {
        self.pending_create.is_some() || self.interaction.is_some()
    }

    pub fn is_moving(&self) -> bool {
        self.reposition.is_some()
    }

    /// Whether pointer input should be routed here at all.
    pub fn wants_pointer(&self) -> bool {
        self.interaction.is_some() || self.reposition.is_some()
    }

    pub fn set_parameter(&mut self, parameter: ViewshedParameter) -> Result<(), ViewshedError> {
        let entity = self.current_mut().ok_or(ViewshedError::NoCurrentViewshed)?;
        parameter.apply(entity)
    }

    /// Replace the defaults for future viewsheds. The height mode only follows
    /// the config while nothing is current.
    pub fn apply_config(&mut self, config: ViewshedConfig) {
        self.heights.set_eye_height(config.eye_height);
        if self.current.is_none() && self.heights.mode() != config.height_mode {
            self.heights.switch_create(None, config.height_mode);
            self.events
                .push(ViewshedEvent::HeightModeChanged(config.height_mode));
        }
        self.config = config;
    }

    fn set_mode(&mut self, mode: ViewshedMode) {
        if self.mode != mode {
            info!("Viewshed mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
            self.events.push(ViewshedEvent::ModeChanged(mode));
        }
    }

    fn set_current(&mut self, id: Option<ViewshedId>) {
        if self.current != id {
            self.current = id;
            self.generation += 1;
            self.heights.cancel();
            self.events.push(ViewshedEvent::CurrentChanged(id));
        }
    }

    /// Begin creating a viewshed of `kind`. Everything current is stopped now;
    /// the new viewshed is built on the next [`ViewshedManager::tick`].
    pub fn create_viewshed(&mut self, kind: ViewshedKind) {
        self.stop(true);
        self.pending_create = Some(kind);
        info!("Creating {} viewshed", kind.as_str());
    }

    /// Run deferred work: builds the viewshed requested by `create_viewshed`.
    pub fn tick(&mut self) -> Result<(), ViewshedError> {
        let Some(kind) = self.pending_create.take() else {
            return Ok(());
        };

        let interaction = match PositioningInteraction::new(&self.surface) {
            Ok(interaction) => interaction,
            Err(e) => {
                error!("Cannot create viewshed: {e}");
                return Err(e);
            }
        };
        let mut entity = ViewshedEntity::new(
            kind,
            ViewshedOptions {
                height_offset: self.heights.default_offset(),
                frustum: self.config.frustum(),
                colors: self.config.colors,
                ..Default::default()
            },
        )?;
        if let Err(e) = entity.bind(&self.surface) {
            error!("Cannot create viewshed: {e}");
            return Err(e);
        }

        let id = entity.id();
        self.transient = Some(entity);
        self.set_current(Some(id));
        self.interaction = Some(interaction);
        self.set_mode(ViewshedMode::Create);
        Ok(())
    }

    /// Route pointer input to the running interaction or reposition session.
    /// Returns false when nothing consumed it.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> bool {
        if self.interaction.is_some() {
            self.handle_positioning(event);
            return true;
        }
        if self.reposition.is_some() {
            self.handle_reposition(event);
            return true;
        }
        false
    }

    fn handle_positioning(&mut self, event: &PointerEvent) {
        let Some(interaction) = self.interaction.as_mut() else {
            return;
        };
        let current = self.current;
        let Some(entity) = self
            .transient
            .as_mut()
            .filter(|entity| Some(entity.id()) == current)
        else {
            warn!("Viewshed vanished while being placed");
            self.stop(true);
            return;
        };

        match interaction.handle(entity, event) {
            Some(PositioningNotice::Positioned(_)) => {
                let id = entity.id();
                self.events.push(ViewshedEvent::Positioned(id));
            }
            Some(PositioningNotice::Finished(_)) => self.finish_create(),
            None => {}
        }
    }

    fn finish_create(&mut self) {
        if let Some(mut interaction) = self.interaction.take() {
            interaction.destroy();
        }
        match self.current_mut() {
            Some(entity) => {
                entity.set_show_marker(true);
                self.set_mode(ViewshedMode::Edit);
            }
            None => self.stop(true),
        }
    }

    fn handle_reposition(&mut self, event: &PointerEvent) {
        let Some(session) = self.reposition.as_mut() else {
            return;
        };
        for change in session.handle_pointer(event) {
            match change {
                RepositionEvent::Moved(position) => {
                    if let Some(entity) = self.current_mut() {
                        if let Err(e) = entity.set_position(position) {
                            warn!("Ignoring reposition: {e}");
                        }
                    }
                }
                RepositionEvent::Stopped => self.end_move(),
            }
        }
    }

    /// Enter or leave MOVE. Enabling without a current viewshed, or disabling
    /// without a session, does nothing.
    pub fn move_current_viewshed(&mut self, enable: bool) {
        if !enable {
            self.end_move();
            return;
        }
        if self.reposition.is_some() || self.interaction.is_some() {
            return;
        }
        let Some(entity) = self.current() else {
            return;
        };
        let session =
            RepositionSession::start(self.edit_provider.as_ref(), entity, self.heights.mode());
        self.reposition = Some(session);
        self.set_mode(ViewshedMode::Move);
    }

    fn end_move(&mut self) {
        // Taken out first: nothing the session does on stop can reach it again.
        let Some(mut session) = self.reposition.take() else {
            return;
        };
        session.stop();
        if self.mode == ViewshedMode::Move {
            self.set_mode(ViewshedMode::Edit);
        }
    }

    /// Height mode changes need a different kind of edit session.
    fn restart_move(&mut self) {
        if self.reposition.is_some() {
            self.end_move();
            self.move_current_viewshed(true);
        }
    }

    /// Store the current transient viewshed. Returns its new title, or
    /// `None` when there is nothing to store or it is still being placed.
    pub fn persist_current(&mut self) -> Option<String> {
        if self.is_creating() {
            warn!("Cannot persist a viewshed that is still being placed");
            return None;
        }
        let current = self.current?;
        let entity = self
            .transient
            .take_if(|entity| entity.id() == current)?;
        let title = self.collection.add(entity, true);
        self.events.push(ViewshedEvent::Persisted {
            id: current,
            title: title.clone(),
        });
        Some(title)
    }

    /// Back to NULL. Safe to call in any state, any number of times.
    pub fn stop(&mut self, clear_selection: bool) {
        self.pending_create = None;
        self.remove_interactions();
        self.deactivate_current();
        self.set_current(None);
        self.set_mode(ViewshedMode::Null);
        if clear_selection && !self.selection.is_empty() {
            self.selection.clear();
            self.events.push(ViewshedEvent::SelectionCleared);
        }
    }

    /// More than one stored viewshed selected: nothing is current, manager stays alive.
    pub fn setup_multi_select(&mut self) {
        self.pending_create = None;
        self.remove_interactions();
        self.deactivate_current();
        self.set_current(None);
        self.set_mode(ViewshedMode::MultiSelect);
    }

    fn remove_interactions(&mut self) {
        if let Some(mut interaction) = self.interaction.take() {
            interaction.destroy();
        }
        if let Some(mut session) = self.reposition.take() {
            session.stop();
        }
    }

    /// Destroy a transient current viewshed, deactivate a persisted one.
    fn deactivate_current(&mut self) {
        if let Some(mut entity) = self.transient.take() {
            entity.unbind();
            info!("Transient viewshed {} destroyed", entity.id());
        }
        let Some(id) = self.current else {
            return;
        };
        if let Some(entity) = self.collection.get_mut(id) {
            entity.unbind();
        }
        if self.collection.contains(id) {
            let _ = self.collection.set_visible(id, false);
        }
    }

    pub fn view_viewshed(&mut self, id: ViewshedId) -> Result<(), ViewshedError> {
        self.open(id, ViewshedMode::View)
    }

    pub fn edit_viewshed(&mut self, id: ViewshedId) -> Result<(), ViewshedError> {
        self.open(id, ViewshedMode::Edit)
    }

    fn open(&mut self, id: ViewshedId, mode: ViewshedMode) -> Result<(), ViewshedError> {
        if self.current == Some(id) {
            self.pending_create = None;
            self.remove_interactions();
            let surface = self.surface.clone();
            if let Some(entity) = self.current_mut() {
                entity.bind(&surface)?;
            }
            self.set_mode(mode);
            return Ok(());
        }
        if !self.collection.contains(id) {
            return Err(ViewshedError::UnknownViewshed(id));
        }

        self.pending_create = None;
        self.remove_interactions();
        self.deactivate_current();
        self.set_current(None);

        let surface = self.surface.clone();
        let entity = self
            .collection
            .get_mut(id)
            .ok_or(ViewshedError::UnknownViewshed(id))?;
        if let Err(e) = entity.bind(&surface) {
            error!("Cannot activate viewshed {id}: {e}");
            self.set_mode(ViewshedMode::Null);
            return Err(e);
        }
        self.infer_height_mode(id);
        let _ = self.collection.set_visible(id, true);
        self.set_current(Some(id));
        self.set_mode(mode);
        Ok(())
    }

    /// Make an entity that is not in the collection current, e.g. after a reload.
    pub fn open_transient(
        &mut self,
        mut entity: ViewshedEntity,
        mode: ViewshedMode,
    ) -> Result<(), ViewshedError> {
        self.pending_create = None;
        self.remove_interactions();
        self.deactivate_current();
        self.set_current(None);

        if let Err(e) = entity.bind(&self.surface) {
            self.set_mode(ViewshedMode::Null);
            return Err(e);
        }
        let id = entity.id();
        self.transient = Some(entity);
        self.infer_height_mode(id);
        self.set_current(Some(id));
        self.set_mode(mode);
        Ok(())
    }

    fn infer_height_mode(&mut self, id: ViewshedId) {
        let before = self.heights.mode();
        if let Some(entity) = lookup(&self.transient, &self.collection, id) {
            self.heights.infer(entity);
        }
        if self.heights.mode() != before {
            self.events
                .push(ViewshedEvent::HeightModeChanged(self.heights.mode()));
        }
    }

    /// Change the height mode. In create/idle states this is immediate; for an
    /// existing viewshed switching to relative waits for terrain (see
    /// [`ViewshedManager::take_terrain_requests`]).
    pub fn set_height_mode(&mut self, mode: HeightMode) -> Result<HeightSwitch, ViewshedError> {
        let editing = matches!(
            self.mode,
            ViewshedMode::Edit | ViewshedMode::View | ViewshedMode::Move
        );
        let entity = match self.current {
            Some(id) => lookup_mut(&mut self.transient, &mut self.collection, id),
            None => None,
        };

        let switch = match entity {
            Some(entity) if editing => {
                self.heights
                    .begin_edit_switch(entity, mode, self.generation)?
            }
            entity => self.heights.switch_create(entity, mode),
        };

        match &switch {
            HeightSwitch::Applied => {
                self.events.push(ViewshedEvent::HeightModeChanged(mode));
                self.restart_move();
            }
            HeightSwitch::Pending(request) => self.terrain_requests.push(request.clone()),
            HeightSwitch::Unchanged => {}
        }
        Ok(switch)
    }

    pub fn take_terrain_requests(&mut self) -> Vec<TerrainRequest> {
        std::mem::take(&mut self.terrain_requests)
    }

    /// Deliver a terrain answer. Answers for a viewshed that is no longer
    /// current, or for a superseded request, are dropped.
    pub fn complete_terrain_request(
        &mut self,
        token: TerrainToken,
        result: Result<Vec<Cartographic>, ViewshedError>,
    ) -> bool {
        let current = self.current;
        let entity = lookup_mut(&mut self.transient, &mut self.collection, token.viewshed)
            .filter(|_| current == Some(token.viewshed));
        let applied = self
            .heights
            .complete(token, self.generation, entity, result);
        if applied {
            self.events
                .push(ViewshedEvent::HeightModeChanged(HeightMode::Relative));
            self.restart_move();
        }
        applied
    }

    /// React to shadow-slot changes on the surface: if someone else took it
    /// from the current viewshed, stop without touching the selection. A
    /// setter may already have noticed and unbound the viewshed, so a current
    /// viewshed without a binding counts as preempted too.
    pub fn process_surface_changes(&mut self) -> bool {
        self.surface.drain_changes();
        let preempted = self
            .current_mut()
            .is_some_and(|entity| entity.check_preempted() || !entity.is_active());
        if preempted {
            warn!("Shadow source taken over externally, stopping viewshed tool");
            self.stop(false);
        }
        preempted
    }

    /// A different rendering surface became active.
    pub fn activate_surface(&mut self, surface: RenderSurface) {
        if surface.id() == self.surface.id() {
            return;
        }
        self.stop(false);
        self.surface = surface;
        info!("Viewshed manager moved to surface {}", self.surface.id().0);
    }

    /// List visibility toggle: show a stored viewshed, or stop it if it is the current one.
    pub fn toggle_visibility(&mut self, id: ViewshedId) -> Result<(), ViewshedError> {
        if !self.collection.contains(id) {
            return Err(ViewshedError::UnknownViewshed(id));
        }
        if self.current == Some(id) {
            self.stop(true);
            Ok(())
        } else {
            self.view_viewshed(id)
        }
    }

    /// External selection in the collection list.
    pub fn set_selection(&mut self, ids: Vec<ViewshedId>) -> Result<(), ViewshedError> {
        match ids.as_slice() {
            [] => {
                if self.mode == ViewshedMode::MultiSelect {
                    self.stop(false);
                }
            }
            [id] => self.edit_viewshed(*id)?,
            _ => self.setup_multi_select(),
        }
        self.selection = ids;
        Ok(())
    }

    pub fn remove_persisted(&mut self, id: ViewshedId) -> Result<(), ViewshedError> {
        if !self.collection.contains(id) {
            return Err(ViewshedError::UnknownViewshed(id));
        }
        if self.current == Some(id) {
            self.stop(true);
        }
        self.selection.retain(|selected| *selected != id);
        self.collection.remove(id);
        Ok(())
    }

    pub fn rename_persisted(
        &mut self,
        id: ViewshedId,
        title: impl Into<String>,
    ) -> Result<(), ViewshedError> {
        self.collection.rename(id, title)
    }

    pub fn import_collection(&mut self, json: &str) -> Result<Vec<ViewshedId>, ViewshedError> {
        self.collection.import_json(json)
    }

    pub fn export_collection(&self) -> Result<String, ViewshedError> {
        self.collection.export_json()
    }

    pub fn session_state(&self) -> ManagerSessionState {
        ManagerSessionState {
            mode: self.mode,
            height_mode: self.heights.mode(),
            current: self.current().map(ViewshedEntity::to_snapshot),
        }
    }

    /// Put the manager back into a saved state. A stored viewshed with the
    /// same title is reused; anything else comes back as a transient viewshed.
    pub fn restore_session(&mut self, state: &ManagerSessionState) -> Result<(), ViewshedError> {
        self.stop(true);

        let target = match state.mode {
            ViewshedMode::View => Some(ViewshedMode::View),
            ViewshedMode::Edit | ViewshedMode::Move | ViewshedMode::Create => {
                Some(ViewshedMode::Edit)
            }
            ViewshedMode::Null | ViewshedMode::MultiSelect => None,
        };
        let (Some(mode), Some(snapshot)) = (target, state.current.as_ref()) else {
            if self.heights.switch_create(None, state.height_mode) == HeightSwitch::Applied {
                self.events
                    .push(ViewshedEvent::HeightModeChanged(state.height_mode));
            }
            return Ok(());
        };

        let stored = snapshot
            .title
            .as_deref()
            .and_then(|title| self.collection.find_by_title(title));
        match stored {
            Some(id) => self.open(id, mode),
            None => {
                let mut entity = ViewshedEntity::from_snapshot(snapshot)?;
                entity.set_persisted_title(None);
                self.open_transient(entity, mode)
            }
        }
    }

    /// Everything observable that happened since the last call.
    pub fn drain_events(&mut self) -> Vec<ViewshedEvent> {
        if let Some(id) = self.current {
            if let Some(entity) = lookup_mut(&mut self.transient, &mut self.collection, id) {
                for notice in entity.take_notices() {
                    match notice {
                        EntityNotice::PositionChanged(position) => self
                            .events
                            .push(ViewshedEvent::PositionChanged { id, position }),
                    }
                }
            }
        }
        for event in self.collection.drain_events() {
            self.events.push(ViewshedEvent::Collection(event));
        }
        std::mem::take(&mut self.events)
    }
}
