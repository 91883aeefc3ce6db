use bevy::prelude::*;
use serde_json::{Value, json};

use crate::engine::plugin::tick_manager;
use crate::viewshed::entity::{ViewshedId, ViewshedKind};
use crate::viewshed::error::ViewshedError;
use crate::viewshed::height_mode::{HeightMode, HeightSwitch};
use crate::viewshed::manager::{ManagerSessionState, ViewshedManager};
use crate::viewshed::parameter::ViewshedParameter;

/// Everything the frontend or keyboard can ask of the viewshed manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewshedAction {
    Create(ViewshedKind),
    Stop,
    Persist,
    Move(bool),
    ToggleMove,
    SetHeightMode(HeightMode),
    ToggleHeightMode,
    View(ViewshedId),
    Edit(ViewshedId),
    ToggleVisibility(ViewshedId),
    Remove(ViewshedId),
    Rename(ViewshedId, String),
    Select(Vec<ViewshedId>),
    SetParameter(ViewshedParameter),
    Restore(ManagerSessionState),
    Import(String),
    Export,
    QueryState,
    List,
}

/// Source of an action for debugging and conditional logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSource {
    Rpc,
    Keyboard,
}

#[derive(Event, Debug, Clone)]
pub struct ViewshedActionEvent {
    pub action: ViewshedAction,
    pub source: ActionSource,
}

impl ViewshedActionEvent {
    pub fn keyboard(action: ViewshedAction) -> Self {
        Self {
            action,
            source: ActionSource::Keyboard,
        }
    }
}

/// Keyboard-driven viewshed actions, applied before the manager ticks.
pub struct ViewshedToolPlugin;

impl Plugin for ViewshedToolPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ViewshedActionEvent>().add_systems(
            Update,
            (handle_viewshed_keyboard_shortcuts, handle_viewshed_actions)
                .chain()
                .before(tick_manager),
        );
    }
}

/// Mode, height mode, selection and the current viewshed as JSON.
pub fn state_json(manager: &ViewshedManager) -> Value {
    let current = manager.current().map(|entity| {
        json!({
            "id": entity.id(),
            "title": entity.persisted_title(),
            "snapshot": entity.to_snapshot(),
        })
    });
    json!({
        "mode": manager.mode(),
        "heightMode": manager.height_mode(),
        "moving": manager.is_moving(),
        "current": current,
        "selection": manager.selection(),
    })
}

/// Persisted viewsheds in the order they were stored.
pub fn list_json(manager: &ViewshedManager) -> Value {
    let collection = manager.collection();
    let entries = collection
        .iter()
        .map(|entity| {
            json!({
                "id": entity.id(),
                "title": entity.persisted_title(),
                "kind": entity.kind().as_str(),
                "visible": collection.is_visible(entity.id()),
            })
        })
        .collect::<Vec<_>>();
    Value::Array(entries)
}

/// Run one action against the manager and describe the outcome.
pub fn apply_action(
    manager: &mut ViewshedManager,
    action: ViewshedAction,
) -> Result<Value, ViewshedError> {
    match action {
        ViewshedAction::Create(kind) => {
            manager.create_viewshed(kind);
            Ok(json!({ "kind": kind.as_str() }))
        }
        ViewshedAction::Stop => {
            manager.stop(true);
            Ok(state_json(manager))
        }
        ViewshedAction::Persist => {
            if manager.is_creating() {
                return Err(ViewshedError::PlacementInProgress);
            }
            let title = manager
                .persist_current()
                .ok_or(ViewshedError::NoCurrentViewshed)?;
            Ok(json!({ "id": manager.current_id(), "title": title }))
        }
        ViewshedAction::Move(enable) => {
            if enable && manager.current_id().is_none() {
                return Err(ViewshedError::NoCurrentViewshed);
            }
            manager.move_current_viewshed(enable);
            Ok(json!({ "moving": manager.is_moving() }))
        }
        ViewshedAction::ToggleMove => {
            let enable = !manager.is_moving();
            apply_action(manager, ViewshedAction::Move(enable))
        }
        ViewshedAction::SetHeightMode(mode) => {
            let switch = manager.set_height_mode(mode)?;
            Ok(json!({
                "heightMode": manager.height_mode(),
                "pending": matches!(switch, HeightSwitch::Pending(_)),
            }))
        }
        ViewshedAction::ToggleHeightMode => {
            let mode = match manager.height_mode() {
                HeightMode::Absolute => HeightMode::Relative,
                HeightMode::Relative => HeightMode::Absolute,
            };
            apply_action(manager, ViewshedAction::SetHeightMode(mode))
        }
        ViewshedAction::View(id) => {
            manager.view_viewshed(id)?;
            Ok(state_json(manager))
        }
        ViewshedAction::Edit(id) => {
            manager.edit_viewshed(id)?;
            Ok(state_json(manager))
        }
        ViewshedAction::ToggleVisibility(id) => {
            manager.toggle_visibility(id)?;
            Ok(json!({ "id": id, "visible": manager.collection().is_visible(id) }))
        }
        ViewshedAction::Remove(id) => {
            manager.remove_persisted(id)?;
            Ok(json!({ "id": id, "removed": true }))
        }
        ViewshedAction::Rename(id, title) => {
            manager.rename_persisted(id, title.clone())?;
            Ok(json!({ "id": id, "title": title }))
        }
        ViewshedAction::Select(ids) => {
            manager.set_selection(ids)?;
            Ok(state_json(manager))
        }
        ViewshedAction::SetParameter(parameter) => {
            manager.set_parameter(parameter)?;
            Ok(state_json(manager))
        }
        ViewshedAction::Restore(state) => {
            manager.restore_session(&state)?;
            Ok(state_json(manager))
        }
        ViewshedAction::Import(document) => {
            let ids = manager.import_collection(&document)?;
            Ok(json!({ "imported": ids }))
        }
        ViewshedAction::Export => {
            let document = manager.export_collection()?;
            Ok(serde_json::from_str(&document)?)
        }
        ViewshedAction::QueryState => Ok(state_json(manager)),
        ViewshedAction::List => Ok(list_json(manager)),
    }
}

pub fn handle_viewshed_actions(
    mut events: EventReader<ViewshedActionEvent>,
    mut manager: ResMut<ViewshedManager>,
) {
    for event in events.read() {
        match apply_action(&mut manager, event.action.clone()) {
            Ok(_) => debug!("Viewshed action {:?} via {:?}", event.action, event.source),
            Err(err) => warn!(
                "Viewshed action {:?} via {:?} failed: {err}",
                event.action, event.source
            ),
        }
    }
}

/// Keyboard shortcuts for viewshed actions (native builds only).
#[cfg(not(target_arch = "wasm32"))]
pub fn handle_viewshed_keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut actions: EventWriter<ViewshedActionEvent>,
) {
    let shortcuts = [
        (KeyCode::KeyC, ViewshedAction::Create(ViewshedKind::Cone)),
        (
            KeyCode::KeyO,
            ViewshedAction::Create(ViewshedKind::Omnidirectional),
        ),
        (KeyCode::KeyM, ViewshedAction::ToggleMove),
        (KeyCode::KeyH, ViewshedAction::ToggleHeightMode),
        (KeyCode::KeyP, ViewshedAction::Persist),
        (KeyCode::Escape, ViewshedAction::Stop),
    ];
    for (key, action) in shortcuts {
        if keyboard.just_pressed(key) {
            actions.write(ViewshedActionEvent::keyboard(action));
        }
    }
}

/// No keyboard shortcuts in WASM builds; actions arrive over RPC.
#[cfg(target_arch = "wasm32")]
pub fn handle_viewshed_keyboard_shortcuts() {}
