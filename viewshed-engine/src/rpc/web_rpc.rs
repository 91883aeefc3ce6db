use std::str::FromStr;

use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::engine::plugin::{publish_manager_events, tick_manager};
use crate::tools::viewshed_tool::{ViewshedAction, apply_action};
use crate::viewshed::collection::CollectionEvent;
use crate::viewshed::entity::{ViewshedId, ViewshedKind};
use crate::viewshed::error::ViewshedError;
use crate::viewshed::height_mode::HeightMode;
use crate::viewshed::manager::{ManagerSessionState, ViewshedEvent, ViewshedManager};
use crate::viewshed::parameter::ViewshedParameter;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

/// Resource managing bidirectional RPC communication with the host page.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the frontend without expecting response.
    pub fn send_notification(&mut self, method: &str, params: Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing the postMessage RPC layer for iframe deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (process_incoming_messages, handle_rpc_messages)
                    .chain()
                    .before(tick_manager),
            )
            .add_systems(
                Update,
                (forward_viewshed_events, send_outgoing_messages)
                    .chain()
                    .after(publish_manager_events),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::{Arc, Mutex};

    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();
            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    if let Some(window) = window() {
        if let Err(e) =
            window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            error!("Failed to register message listener: {:?}", e);
        }
    }

    // Ownership moves to JS; the listener lives as long as the page.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Messages received by the JS listener, drained once per frame.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    diagnostics: Res<DiagnosticsStore>,
    mut manager: ResMut<ViewshedManager>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    let fps = current_fps(&diagnostics);
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("Processing RPC method: {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut manager, fps) {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("Unparseable RPC message: {parse_error}");
                rpc_interface.send_notification(
                    "debug_message",
                    json!({ "message": format!("Parse error: {}", parse_error) }),
                );
            }
        }
    }
}

fn current_fps(diagnostics: &DiagnosticsStore) -> f64 {
    diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|fps_diagnostic| fps_diagnostic.smoothed())
        .unwrap_or(0.0)
}

/// Handle one request. Requests without an id are notifications and get no
/// response, but their action still runs.
pub fn handle_rpc_request(
    request: &RpcRequest,
    manager: &mut ViewshedManager,
    fps: f64,
) -> Option<RpcResponse> {
    let result = match request.method.as_str() {
        "get_fps" => Ok(json!({ "fps": fps as f32 })),
        method => match action_for(method, &request.params) {
            Some(Ok(action)) => apply_action(manager, action).map_err(RpcError::from),
            Some(Err(error)) => Err(error),
            None => {
                warn!("Unknown RPC method: {}", request.method);
                let id = request.id.clone()?;
                return Some(create_error_response(
                    id,
                    -32601,
                    "Method not found",
                    Some(json!({ "method": request.method })),
                ));
            }
        },
    };

    if let Err(error) = &result {
        warn!("RPC {} failed: {}", request.method, error.message);
    }
    let id = request.id.clone()?;
    Some(match result {
        Ok(result_value) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        },
        Err(error) => RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        },
    })
}

fn params<T: for<'de> Deserialize<'de>>(params: &Value, expected: &str) -> Result<T, RpcError> {
    serde_json::from_value::<T>(params.clone())
        .map_err(|_| RpcError::invalid_params(&format!("Expected {expected}")))
}

#[derive(Deserialize)]
struct IdParams {
    id: u64,
}

fn id_param(value: &Value) -> Result<ViewshedId, RpcError> {
    params::<IdParams>(value, "'id' parameter").map(|p| ViewshedId(p.id))
}

/// Map a method name and its params to a viewshed action; `None` for unknown methods.
pub fn action_for(method: &str, value: &Value) -> Option<Result<ViewshedAction, RpcError>> {
    #[derive(Deserialize)]
    struct KindParams {
        kind: String,
    }
    #[derive(Deserialize)]
    struct MoveParams {
        enable: Option<bool>,
    }
    #[derive(Deserialize)]
    struct HeightModeParams {
        mode: HeightMode,
    }
    #[derive(Deserialize)]
    struct ParameterParams {
        name: String,
        value: Value,
    }
    #[derive(Deserialize)]
    struct RenameParams {
        id: u64,
        title: String,
    }
    #[derive(Deserialize)]
    struct SelectParams {
        ids: Vec<u64>,
    }
    #[derive(Deserialize)]
    struct ImportParams {
        document: Value,
    }

    let action = match method {
        "create_viewshed" => params::<KindParams>(value, "'kind' parameter").and_then(|p| {
            ViewshedKind::from_str(&p.kind)
                .map(ViewshedAction::Create)
                .map_err(RpcError::from)
        }),
        "stop_viewshed" => Ok(ViewshedAction::Stop),
        "persist_viewshed" => Ok(ViewshedAction::Persist),
        "move_viewshed" => {
            params::<MoveParams>(value, "optional 'enable' flag").map(|p| match p.enable {
                Some(enable) => ViewshedAction::Move(enable),
                None => ViewshedAction::ToggleMove,
            })
        }
        "set_height_mode" => params::<HeightModeParams>(value, "'mode' of absolute or relative")
            .map(|p| ViewshedAction::SetHeightMode(p.mode)),
        "set_viewshed_parameter" => params::<ParameterParams>(value, "'name' and 'value'")
            .and_then(|p| {
                ViewshedParameter::parse(&p.name, &p.value)
                    .map(ViewshedAction::SetParameter)
                    .map_err(RpcError::from)
            }),
        "get_viewshed_state" => Ok(ViewshedAction::QueryState),
        "list_viewsheds" => Ok(ViewshedAction::List),
        "view_viewshed" => id_param(value).map(ViewshedAction::View),
        "edit_viewshed" => id_param(value).map(ViewshedAction::Edit),
        "toggle_viewshed_visibility" => id_param(value).map(ViewshedAction::ToggleVisibility),
        "remove_viewshed" => id_param(value).map(ViewshedAction::Remove),
        "rename_viewshed" => params::<RenameParams>(value, "'id' and 'title'")
            .map(|p| ViewshedAction::Rename(ViewshedId(p.id), p.title)),
        "select_viewsheds" => params::<SelectParams>(value, "'ids' array")
            .map(|p| ViewshedAction::Select(p.ids.into_iter().map(ViewshedId).collect())),
        "export_viewsheds" => Ok(ViewshedAction::Export),
        "import_viewsheds" => {
            params::<ImportParams>(value, "'document' parameter").map(|p| match p.document {
                Value::String(document) => ViewshedAction::Import(document),
                document => ViewshedAction::Import(document.to_string()),
            })
        }
        "restore_viewshed_session" => params::<ManagerSessionState>(value, "a session state")
            .map(ViewshedAction::Restore),
        _ => return None,
    };
    Some(action)
}

/// Notification method and payload for a manager event.
pub fn notification_for(event: &ViewshedEvent) -> (&'static str, Value) {
    match event {
        ViewshedEvent::ModeChanged(mode) => ("viewshed_mode_changed", json!({ "mode": mode })),
        ViewshedEvent::CurrentChanged(id) => ("viewshed_current_changed", json!({ "id": id })),
        ViewshedEvent::Positioned(id) => ("viewshed_positioned", json!({ "id": id })),
        ViewshedEvent::PositionChanged { id, position } => (
            "viewshed_position_changed",
            json!({ "id": id, "position": position }),
        ),
        ViewshedEvent::HeightModeChanged(mode) => {
            ("viewshed_height_mode_changed", json!({ "mode": mode }))
        }
        ViewshedEvent::Persisted { id, title } => {
            ("viewshed_persisted", json!({ "id": id, "title": title }))
        }
        ViewshedEvent::Collection(CollectionEvent::Added(id)) => {
            ("viewshed_added", json!({ "id": id }))
        }
        ViewshedEvent::Collection(CollectionEvent::Removed(id)) => {
            ("viewshed_removed", json!({ "id": id }))
        }
        ViewshedEvent::Collection(CollectionEvent::Renamed { id, title }) => {
            ("viewshed_renamed", json!({ "id": id, "title": title }))
        }
        ViewshedEvent::Collection(CollectionEvent::VisibilityChanged { id, visible }) => (
            "viewshed_visibility_changed",
            json!({ "id": id, "visible": visible }),
        ),
        ViewshedEvent::SelectionCleared => ("viewshed_selection_cleared", json!({})),
    }
}

fn forward_viewshed_events(
    mut events: EventReader<ViewshedEvent>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        let (method, params) = notification_for(event);
        rpc_interface.send_notification(method, params);
    }
}

/// Send queued notifications and responses to the parent window.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }
    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
    }
}

fn create_error_response(id: Value, code: i32, message: &str, data: Option<Value>) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

impl From<ViewshedError> for RpcError {
    fn from(error: ViewshedError) -> Self {
        match error {
            ViewshedError::NoRenderContext(_) | ViewshedError::Terrain(_) => {
                Self::internal_error(&error.to_string())
            }
            other => Self::invalid_params(&other.to_string()),
        }
    }
}
