//! End-to-end viewshed flows through the public action and RPC layers.

use bevy::tasks::block_on;
use serde_json::{Value, json};
use viewshed_engine::engine::terrain::{GeoRect, HeightmapTerrain, TerrainQuery};
use viewshed_engine::rpc::web_rpc::{RpcRequest, handle_rpc_request};
use viewshed_engine::tools::viewshed_tool::{ViewshedAction, apply_action};
use viewshed_engine::viewshed::surface::ShadowOwner;
use viewshed_engine::viewshed::{
    Cartographic, HeightMode, PointerEvent, RenderSurface, SurfaceId, ViewshedConfig,
    ViewshedId, ViewshedKind, ViewshedManager, ViewshedMode, ViewshedParameter,
};

const ORIGIN: Cartographic = Cartographic::new(8.54, 47.37, 400.0);

fn manager() -> ViewshedManager {
    ViewshedManager::new(RenderSurface::new(SurfaceId(42)), ViewshedConfig::default())
}

fn place(manager: &mut ViewshedManager, kind: ViewshedKind) -> ViewshedId {
    apply_action(manager, ViewshedAction::Create(kind)).unwrap();
    manager.tick().unwrap();
    assert_eq!(manager.mode(), ViewshedMode::Create);

    manager.handle_pointer(&PointerEvent::click(ORIGIN));
    manager.handle_pointer(&PointerEvent::click(Cartographic::new(
        ORIGIN.longitude + 0.001,
        ORIGIN.latitude,
        ORIGIN.height,
    )));
    assert_eq!(manager.mode(), ViewshedMode::Edit);
    manager.current_id().unwrap()
}

fn rpc(manager: &mut ViewshedManager, method: &str, params: Value) -> Value {
    let request = RpcRequest {
        jsonrpc: "2.0".into(),
        method: method.into(),
        params,
        id: Some(json!(1)),
    };
    let response = handle_rpc_request(&request, manager, 0.0).unwrap();
    assert!(response.error.is_none(), "{method} failed: {:?}", response.error);
    response.result.unwrap()
}

#[test]
fn persisted_viewshed_can_be_revisited() {
    let mut manager = manager();
    let id = place(&mut manager, ViewshedKind::Cone);

    let persisted = apply_action(&mut manager, ViewshedAction::Persist).unwrap();
    assert_eq!(persisted["title"], "cone-1");

    apply_action(&mut manager, ViewshedAction::Stop).unwrap();
    assert_eq!(manager.mode(), ViewshedMode::Null);
    assert!(manager.surface().markers().is_empty());
    assert_eq!(manager.surface().shadow_owner(), ShadowOwner::Default);
    assert!(!manager.collection().is_visible(id));

    apply_action(&mut manager, ViewshedAction::ToggleVisibility(id)).unwrap();
    assert_eq!(manager.mode(), ViewshedMode::View);
    assert_eq!(manager.current_id(), Some(id));
    assert!(manager.collection().is_visible(id));

    apply_action(&mut manager, ViewshedAction::ToggleVisibility(id)).unwrap();
    assert_eq!(manager.mode(), ViewshedMode::Null);
    assert!(manager.current_id().is_none());

    apply_action(&mut manager, ViewshedAction::Edit(id)).unwrap();
    assert_eq!(manager.mode(), ViewshedMode::Edit);
}

#[test]
fn creating_a_second_viewshed_deactivates_the_first() {
    let mut manager = manager();
    let first = place(&mut manager, ViewshedKind::Cone);
    apply_action(&mut manager, ViewshedAction::Persist).unwrap();

    let second = place(&mut manager, ViewshedKind::Omnidirectional);
    assert_ne!(first, second);

    let stored = manager.collection().get(first).unwrap();
    assert!(!stored.is_active());
    assert!(!manager.collection().is_visible(first));
    assert!(manager.current().unwrap().is_active());
    assert!(manager.surface().marker(first).is_none());
}

#[test]
fn export_import_moves_collection_between_managers() {
    let mut source = manager();
    place(&mut source, ViewshedKind::Cone);
    apply_action(&mut source, ViewshedAction::Persist).unwrap();
    place(&mut source, ViewshedKind::Omnidirectional);
    apply_action(&mut source, ViewshedAction::Persist).unwrap();

    let document = apply_action(&mut source, ViewshedAction::Export).unwrap();

    let mut target = manager();
    let imported = rpc(
        &mut target,
        "import_viewsheds",
        json!({ "document": document }),
    );
    assert_eq!(imported["imported"].as_array().map(Vec::len), Some(2));

    let list = rpc(&mut target, "list_viewsheds", Value::Null);
    let titles = list
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["title"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["cone-1", "omnidirectional-1"]);
    assert!(list.as_array().unwrap().iter().all(|entry| entry["visible"] == false));
}

#[test]
fn relative_height_uses_terrain_under_the_observer() {
    let terrain = HeightmapTerrain::flat(GeoRect::around(ORIGIN, 0.01), 380.0).unwrap();
    let mut manager = manager();
    place(&mut manager, ViewshedKind::Cone);
    apply_action(
        &mut manager,
        ViewshedAction::SetParameter(ViewshedParameter::Position(ORIGIN.with_height(430.0))),
    )
    .unwrap();

    let result =
        apply_action(&mut manager, ViewshedAction::SetHeightMode(HeightMode::Relative)).unwrap();
    assert_eq!(result["pending"], true);
    assert_eq!(manager.height_mode(), HeightMode::Absolute);

    for request in manager.take_terrain_requests() {
        let heights = block_on(terrain.sample_heights(request.coordinates));
        assert!(manager.complete_terrain_request(request.token, heights));
    }

    assert_eq!(manager.height_mode(), HeightMode::Relative);
    let current = manager.current().unwrap();
    assert!((current.height_offset() - 50.0).abs() < 1e-6);
    assert!((current.apex().height - 430.0).abs() < 1e-6);
}

#[test]
fn terrain_answer_after_stop_is_dropped() {
    let terrain = HeightmapTerrain::flat(GeoRect::around(ORIGIN, 0.01), 380.0).unwrap();
    let mut manager = manager();
    place(&mut manager, ViewshedKind::Cone);
    apply_action(&mut manager, ViewshedAction::SetHeightMode(HeightMode::Relative)).unwrap();
    let requests = manager.take_terrain_requests();
    assert_eq!(requests.len(), 1);

    apply_action(&mut manager, ViewshedAction::Stop).unwrap();
    for request in requests {
        let heights = block_on(terrain.sample_heights(request.coordinates));
        assert!(!manager.complete_terrain_request(request.token, heights));
    }
    assert_eq!(manager.height_mode(), HeightMode::Absolute);
}

#[test]
fn session_restores_over_rpc() {
    let mut original = manager();
    place(&mut original, ViewshedKind::Cone);
    rpc(
        &mut original,
        "set_viewshed_parameter",
        json!({ "name": "range", "value": 250.0 }),
    );
    let state = serde_json::to_value(original.session_state()).unwrap();

    let mut restored = manager();
    let result = rpc(&mut restored, "restore_viewshed_session", state);
    assert_eq!(result["mode"], "edit");
    assert_eq!(result["current"]["snapshot"]["frustum"]["far"], 250.0);
    assert_ne!(restored.surface().shadow_owner(), ShadowOwner::Default);
}

#[test]
fn rpc_move_round_trip() {
    let mut manager = manager();
    place(&mut manager, ViewshedKind::Cone);

    let result = rpc(&mut manager, "move_viewshed", json!({ "enable": true }));
    assert_eq!(result["moving"], true);
    assert_eq!(manager.mode(), ViewshedMode::Move);

    let result = rpc(&mut manager, "move_viewshed", json!({}));
    assert_eq!(result["moving"], false);
    assert_eq!(manager.mode(), ViewshedMode::Edit);
}

#[test]
fn selecting_several_stored_viewsheds_enters_multi_select() {
    let mut manager = manager();
    let first = place(&mut manager, ViewshedKind::Cone);
    apply_action(&mut manager, ViewshedAction::Persist).unwrap();
    let second = place(&mut manager, ViewshedKind::Cone);
    apply_action(&mut manager, ViewshedAction::Persist).unwrap();

    let state = rpc(
        &mut manager,
        "select_viewsheds",
        json!({ "ids": [first.0, second.0] }),
    );
    assert_eq!(state["mode"], "multiSelect");
    assert!(state["current"].is_null());
    assert!(manager.surface().markers().is_empty());

    rpc(&mut manager, "select_viewsheds", json!({ "ids": [] }));
    assert_eq!(manager.mode(), ViewshedMode::Null);
}
